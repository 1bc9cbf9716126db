use crate::errors::ApiError;
use crate::import::{ImportEntry, ImportRowReport};
use crate::models::{Category, StoryRecord};
use crate::validation::StoryDraft;
use async_trait::async_trait;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Default)]
pub struct StoryQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub favorited: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct StoryPage {
    pub items: Vec<StoryRecord>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct StoryStats {
    pub total_stories: u64,
    pub categories_count: u64,
    pub latest_created_at: Option<NaiveDateTime>,
}

#[async_trait]
pub trait StoriesRepository: Clone + Send + Sync + 'static {
    async fn create(&self, draft: &StoryDraft) -> Result<StoryRecord, ApiError>;
    async fn list(&self, query: &StoryQuery) -> Result<StoryPage, ApiError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<StoryRecord>, ApiError>;
    /// Full replacement of a story's fields. `None` when the id is unknown.
    async fn update(&self, id: i32, draft: &StoryDraft) -> Result<Option<StoryRecord>, ApiError>;
    async fn delete(&self, id: i32) -> Result<bool, ApiError>;
    async fn delete_many(&self, ids: &[i32]) -> Result<usize, ApiError>;
    async fn clear(&self) -> Result<usize, ApiError>;
    async fn toggle_favorited(&self, id: i32) -> Result<Option<StoryRecord>, ApiError>;
    /// Runs a prepared import batch, one report entry per row. A bad
    /// row is reported as failed without aborting the rest.
    async fn import_batch(
        &self,
        entries: &[ImportEntry],
    ) -> Result<Vec<ImportRowReport>, ApiError>;
    async fn authors(&self) -> Result<Vec<String>, ApiError>;
    async fn stats(&self) -> Result<StoryStats, ApiError>;
}

#[async_trait]
pub trait CategoriesRepository: Clone + Send + Sync + 'static {
    async fn list(&self) -> Result<Vec<String>, ApiError>;
    async fn create(&self, name: &str) -> Result<Category, ApiError>;
    /// Renames a category, merging into the target when it already
    /// exists. Returns how many stories now carry the new name.
    async fn rename(&self, name: &str, new_name: &str) -> Result<usize, ApiError>;
    /// Removes a category. With `delete_stories` the stories go with
    /// it; otherwise they are reassigned to the fallback category.
    /// Returns the number of stories deleted or reassigned.
    async fn remove(&self, name: &str, delete_stories: bool) -> Result<usize, ApiError>;
}

#[async_trait]
pub trait FavoritesRepository: Clone + Send + Sync + 'static {
    async fn ids_for_user(&self, user_id: &str) -> Result<Vec<i32>, ApiError>;
    /// `false` when the story was already favorited by this user.
    async fn add(&self, story_id: i32, user_id: &str) -> Result<bool, ApiError>;
    async fn remove(&self, story_id: i32, user_id: &str) -> Result<bool, ApiError>;
}
