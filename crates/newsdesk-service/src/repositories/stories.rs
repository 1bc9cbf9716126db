use super::categories::find_or_create;
use super::traits::{StoriesRepository, StoryPage, StoryQuery, StoryStats};
use crate::errors::ApiError;
use crate::import::{ImportEntry, ImportRowReport, RowStatus};
use crate::models::{NewStory, StoryChanges, StoryRecord, UNKNOWN_AUTHOR};
use crate::schema::{categories, stories};
use crate::validation::StoryDraft;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::dsl::{count_distinct, max};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use std::sync::{Arc, Mutex};

/// Applied when a list request does not name a limit.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

type StoryColumns = (
    stories::id,
    stories::title,
    stories::url,
    categories::name,
    stories::author,
    stories::description,
    stories::created_at,
    stories::publication_month,
    stories::publication_year,
    stories::favorited,
);

/// Joined projection behind [`StoryRecord`]; field order must match.
const STORY_COLUMNS: StoryColumns = (
    stories::id,
    stories::title,
    stories::url,
    categories::name,
    stories::author,
    stories::description,
    stories::created_at,
    stories::publication_month,
    stories::publication_year,
    stories::favorited,
);

fn load_record(conn: &mut SqliteConnection, id: i32) -> Result<StoryRecord, ApiError> {
    let record = stories::table
        .inner_join(categories::table)
        .filter(stories::id.eq(id))
        .select(STORY_COLUMNS)
        .first::<StoryRecord>(conn)?;
    Ok(record)
}

fn url_taken(
    conn: &mut SqliteConnection,
    url: &str,
    excluding: Option<i32>,
) -> Result<bool, DieselError> {
    let mut query = stories::table
        .filter(stories::url.eq(url))
        .select(stories::id)
        .into_boxed();
    if let Some(id) = excluding {
        query = query.filter(stories::id.ne(id));
    }
    Ok(query.first::<i32>(conn).optional()?.is_some())
}

#[derive(Clone)]
pub struct SqliteStoriesRepository {
    db: Arc<Mutex<SqliteConnection>>,
}

impl SqliteStoriesRepository {
    pub fn new(db: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { db }
    }

    /// Inserts one prepared import row. `Ok(false)` means the URL was
    /// already present and the row counts as a duplicate.
    fn commit_row(conn: &mut SqliteConnection, entry: &ImportEntry) -> Result<bool, DieselError> {
        if url_taken(conn, &entry.draft.url, None)? {
            return Ok(false);
        }

        let category_id = find_or_create(conn, &entry.draft.category)?;
        let new_story = NewStory::from_draft(&entry.draft, category_id);

        match diesel::insert_into(stories::table)
            .values(&new_story)
            .execute(conn)
        {
            Ok(_) => Ok(true),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl StoriesRepository for SqliteStoriesRepository {
    async fn create(&self, draft: &StoryDraft) -> Result<StoryRecord, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        conn.transaction::<StoryRecord, ApiError, _>(|conn| {
            if url_taken(conn, &draft.url, None)? {
                return Err(ApiError::DuplicateUrl);
            }

            let category_id = find_or_create(conn, &draft.category)?;
            let new_story = NewStory::from_draft(draft, category_id);

            let inserted = diesel::insert_into(stories::table)
                .values(&new_story)
                .returning(stories::id)
                .get_result::<i32>(conn);

            let id = match inserted {
                Ok(id) => id,
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    return Err(ApiError::DuplicateUrl);
                }
                Err(err) => return Err(err.into()),
            };

            load_record(conn, id)
        })
    }

    async fn list(&self, query: &StoryQuery) -> Result<StoryPage, ApiError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        // Filters are applied twice because a boxed query cannot
        // change its select clause after the fact.
        let mut count_query = stories::table
            .inner_join(categories::table)
            .count()
            .into_boxed();
        let mut page_query = stories::table
            .inner_join(categories::table)
            .select(STORY_COLUMNS)
            .into_boxed();

        if let Some(category) = &query.category {
            count_query = count_query.filter(categories::name.eq(category.clone()));
            page_query = page_query.filter(categories::name.eq(category.clone()));
        }

        if let Some(search) = &query.search {
            let pattern = format!("%{search}%");
            count_query = count_query.filter(
                stories::title
                    .like(pattern.clone())
                    .nullable()
                    .or(stories::description.like(pattern.clone())),
            );
            page_query = page_query.filter(
                stories::title
                    .like(pattern.clone())
                    .nullable()
                    .or(stories::description.like(pattern)),
            );
        }

        if let Some(favorited) = query.favorited {
            count_query = count_query.filter(stories::favorited.eq(favorited));
            page_query = page_query.filter(stories::favorited.eq(favorited));
        }

        let total = count_query.get_result::<i64>(conn)?;

        let items = page_query
            .order(stories::created_at.desc())
            .then_order_by(stories::id.desc())
            .limit(limit as i64)
            .offset(offset as i64)
            .load::<StoryRecord>(conn)?;

        Ok(StoryPage {
            items,
            total: total as u64,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<StoryRecord>, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let record = stories::table
            .inner_join(categories::table)
            .filter(stories::id.eq(id))
            .select(STORY_COLUMNS)
            .first::<StoryRecord>(&mut *conn)
            .optional()?;
        Ok(record)
    }

    async fn update(&self, id: i32, draft: &StoryDraft) -> Result<Option<StoryRecord>, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        conn.transaction::<Option<StoryRecord>, ApiError, _>(|conn| {
            let existing = stories::table
                .find(id)
                .select(stories::id)
                .first::<i32>(conn)
                .optional()?;
            if existing.is_none() {
                return Ok(None);
            }

            if url_taken(conn, &draft.url, Some(id))? {
                return Err(ApiError::DuplicateUrl);
            }

            let category_id = find_or_create(conn, &draft.category)?;
            let changes = StoryChanges::from_draft(draft, category_id);

            diesel::update(stories::table.find(id))
                .set(&changes)
                .execute(conn)?;

            load_record(conn, id).map(Some)
        })
    }

    async fn delete(&self, id: i32) -> Result<bool, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let affected = diesel::delete(stories::table.find(id)).execute(&mut *conn)?;
        Ok(affected > 0)
    }

    async fn delete_many(&self, ids: &[i32]) -> Result<usize, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let affected = diesel::delete(stories::table.filter(stories::id.eq_any(ids)))
            .execute(&mut *conn)?;
        Ok(affected)
    }

    async fn clear(&self) -> Result<usize, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let affected = diesel::delete(stories::table).execute(&mut *conn)?;
        Ok(affected)
    }

    async fn toggle_favorited(&self, id: i32) -> Result<Option<StoryRecord>, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        conn.transaction::<Option<StoryRecord>, ApiError, _>(|conn| {
            let current = stories::table
                .find(id)
                .select(stories::favorited)
                .first::<bool>(conn)
                .optional()?;

            let current = match current {
                Some(value) => value,
                None => return Ok(None),
            };

            diesel::update(stories::table.find(id))
                .set(stories::favorited.eq(!current))
                .execute(conn)?;

            load_record(conn, id).map(Some)
        })
    }

    async fn import_batch(
        &self,
        entries: &[ImportEntry],
    ) -> Result<Vec<ImportRowReport>, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        conn.transaction::<Vec<ImportRowReport>, ApiError, _>(|conn| {
            let mut reports = Vec::with_capacity(entries.len());

            for entry in entries {
                let report = match Self::commit_row(conn, entry) {
                    Ok(true) => ImportRowReport {
                        row: entry.row,
                        status: RowStatus::Imported,
                        title: entry.draft.title.clone(),
                        message: "Successfully added".to_string(),
                    },
                    Ok(false) => ImportRowReport {
                        row: entry.row,
                        status: RowStatus::Duplicate,
                        title: entry.draft.title.clone(),
                        message: "URL already exists".to_string(),
                    },
                    Err(err) => ImportRowReport {
                        row: entry.row,
                        status: RowStatus::Failed,
                        title: entry.draft.title.clone(),
                        message: format!("Failed to add: {err}"),
                    },
                };
                reports.push(report);
            }

            Ok(reports)
        })
    }

    async fn authors(&self) -> Result<Vec<String>, ApiError> {
        let mut conn = self.db.lock().unwrap();
        // The placeholder author is an internal sentinel, not a byline
        let authors = stories::table
            .filter(stories::author.ne(UNKNOWN_AUTHOR))
            .select(stories::author)
            .distinct()
            .order(stories::author.asc())
            .load::<String>(&mut *conn)?;
        Ok(authors)
    }

    async fn stats(&self) -> Result<StoryStats, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        let total_stories = stories::table.count().get_result::<i64>(conn)?;
        let categories_count = stories::table
            .select(count_distinct(stories::category_id))
            .get_result::<i64>(conn)?;
        let latest_created_at = stories::table
            .select(max(stories::created_at))
            .get_result::<Option<NaiveDateTime>>(conn)?;

        Ok(StoryStats {
            total_stories: total_stories as u64,
            categories_count: categories_count as u64,
            latest_created_at,
        })
    }
}
