use super::traits::FavoritesRepository;
use crate::errors::ApiError;
use crate::models::NewFavorite;
use crate::schema::favorites;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct SqliteFavoritesRepository {
    db: Arc<Mutex<SqliteConnection>>,
}

impl SqliteFavoritesRepository {
    pub fn new(db: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FavoritesRepository for SqliteFavoritesRepository {
    async fn ids_for_user(&self, user_id: &str) -> Result<Vec<i32>, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let ids = favorites::table
            .filter(favorites::user_id.eq(user_id))
            .select(favorites::story_id)
            .order(favorites::story_id.asc())
            .load::<i32>(&mut *conn)?;
        Ok(ids)
    }

    async fn add(&self, story_id: i32, user_id: &str) -> Result<bool, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let result = diesel::insert_into(favorites::table)
            .values(NewFavorite { story_id, user_id })
            .execute(&mut *conn);

        match result {
            Ok(_) => Ok(true),
            // The (story_id, user_id) pair is unique, so a second add
            // is a no-op rather than an error.
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
            Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
                Err(ApiError::StoryNotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, story_id: i32, user_id: &str) -> Result<bool, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let affected = diesel::delete(
            favorites::table
                .filter(favorites::story_id.eq(story_id))
                .filter(favorites::user_id.eq(user_id)),
        )
        .execute(&mut *conn)?;
        Ok(affected > 0)
    }
}
