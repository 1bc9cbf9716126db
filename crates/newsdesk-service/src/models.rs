use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::validation::StoryDraft;

/// Author value stored when a story arrives without one.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Description applied to imported rows that leave the column blank.
pub const MISSING_DESCRIPTION: &str = "No description provided";

/// Category that absorbs stories when their category is removed
/// without deleting them.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::stories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Story {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub category_id: i32,
    pub author: String,
    pub description: Option<String>,
    pub publication_month: Option<i32>,
    pub publication_year: Option<i32>,
    pub favorited: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::stories)]
pub struct NewStory {
    pub title: String,
    pub url: String,
    pub category_id: i32,
    pub author: String,
    pub description: Option<String>,
    pub publication_month: Option<i32>,
    pub publication_year: Option<i32>,
}

impl NewStory {
    pub fn from_draft(draft: &StoryDraft, category_id: i32) -> Self {
        NewStory {
            title: draft.title.clone(),
            url: draft.url.clone(),
            category_id,
            author: draft.author.clone(),
            description: draft.description.clone(),
            publication_month: draft.publication_month,
            publication_year: draft.publication_year,
        }
    }
}

/// Full-replacement changeset for story edits. `treat_none_as_null`
/// makes a missing optional field clear the column instead of keeping
/// the old value.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::stories, treat_none_as_null = true)]
pub struct StoryChanges {
    pub title: String,
    pub url: String,
    pub category_id: i32,
    pub author: String,
    pub description: Option<String>,
    pub publication_month: Option<i32>,
    pub publication_year: Option<i32>,
}

impl StoryChanges {
    pub fn from_draft(draft: &StoryDraft, category_id: i32) -> Self {
        StoryChanges {
            title: draft.title.clone(),
            url: draft.url.clone(),
            category_id,
            author: draft.author.clone(),
            description: draft.description.clone(),
            publication_month: draft.publication_month,
            publication_year: draft.publication_year,
        }
    }
}

/// A story joined with its category name, the shape the JSON API
/// serves. Field order must match `STORY_COLUMNS` in the repository.
#[derive(Debug, Clone, Queryable, Serialize)]
pub struct StoryRecord {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub category: String,
    pub author: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub publication_month: Option<i32>,
    pub publication_year: Option<i32>,
    pub favorited: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::favorites)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Favorite {
    pub id: i32,
    pub story_id: i32,
    pub user_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::favorites)]
pub struct NewFavorite<'a> {
    pub story_id: i32,
    pub user_id: &'a str,
}
