use super::traits::CategoriesRepository;
use crate::errors::ApiError;
use crate::models::{Category, NewCategory, UNCATEGORIZED};
use crate::schema::{categories, stories};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use std::sync::{Arc, Mutex};

/// Looks a category up by name, creating it when missing. Shared with
/// the stories repository so inserts can resolve category ids inside
/// their own transactions.
pub(crate) fn find_or_create(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i32, DieselError> {
    let existing = categories::table
        .filter(categories::name.eq(name))
        .select(categories::id)
        .first::<i32>(conn)
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let inserted = diesel::insert_into(categories::table)
        .values(NewCategory {
            name: name.to_string(),
        })
        .returning(categories::id)
        .get_result::<i32>(conn);

    match inserted {
        Ok(id) => Ok(id),
        // Lost a race with a concurrent insert of the same name
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            categories::table
                .filter(categories::name.eq(name))
                .select(categories::id)
                .first::<i32>(conn)
        }
        Err(err) => Err(err),
    }
}

fn stories_in_category(conn: &mut SqliteConnection, category_id: i32) -> Result<i64, DieselError> {
    stories::table
        .filter(stories::category_id.eq(category_id))
        .count()
        .get_result::<i64>(conn)
}

#[derive(Clone)]
pub struct SqliteCategoriesRepository {
    db: Arc<Mutex<SqliteConnection>>,
}

impl SqliteCategoriesRepository {
    pub fn new(db: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoriesRepository for SqliteCategoriesRepository {
    async fn list(&self) -> Result<Vec<String>, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let names = categories::table
            .select(categories::name)
            .order(categories::name.asc())
            .load::<String>(&mut *conn)?;
        Ok(names)
    }

    async fn create(&self, name: &str) -> Result<Category, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let result = diesel::insert_into(categories::table)
            .values(NewCategory {
                name: name.to_string(),
            })
            .returning(categories::all_columns)
            .get_result::<Category>(&mut *conn);

        match result {
            Ok(category) => Ok(category),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(ApiError::CategoryExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn rename(&self, name: &str, new_name: &str) -> Result<usize, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        conn.transaction::<usize, ApiError, _>(|conn| {
            let source_id = categories::table
                .filter(categories::name.eq(name))
                .select(categories::id)
                .first::<i32>(conn)
                .optional()?;

            let source_id = match source_id {
                Some(id) => id,
                None => return Err(ApiError::CategoryNotFound),
            };

            if name == new_name {
                let count = stories_in_category(conn, source_id)?;
                return Ok(count as usize);
            }

            let target_id = categories::table
                .filter(categories::name.eq(new_name))
                .select(categories::id)
                .first::<i32>(conn)
                .optional()?;

            match target_id {
                // Target already exists: merge the stories into it and
                // drop the now-empty source category.
                Some(target_id) => {
                    let moved = diesel::update(
                        stories::table.filter(stories::category_id.eq(source_id)),
                    )
                    .set(stories::category_id.eq(target_id))
                    .execute(conn)?;
                    diesel::delete(categories::table.find(source_id)).execute(conn)?;
                    Ok(moved)
                }
                None => {
                    diesel::update(categories::table.find(source_id))
                        .set(categories::name.eq(new_name))
                        .execute(conn)?;
                    let count = stories_in_category(conn, source_id)?;
                    Ok(count as usize)
                }
            }
        })
    }

    async fn remove(&self, name: &str, delete_stories: bool) -> Result<usize, ApiError> {
        let mut conn = self.db.lock().unwrap();
        let conn = &mut *conn;

        conn.transaction::<usize, ApiError, _>(|conn| {
            let category_id = categories::table
                .filter(categories::name.eq(name))
                .select(categories::id)
                .first::<i32>(conn)
                .optional()?;

            let category_id = match category_id {
                Some(id) => id,
                None => return Err(ApiError::CategoryNotFound),
            };

            if delete_stories {
                let deleted = diesel::delete(
                    stories::table.filter(stories::category_id.eq(category_id)),
                )
                .execute(conn)?;
                diesel::delete(categories::table.find(category_id)).execute(conn)?;
                return Ok(deleted);
            }

            // Reassigning the fallback category to itself would leave
            // the stories dangling, so refuse unless it is empty.
            if name == UNCATEGORIZED {
                let count = stories_in_category(conn, category_id)?;
                if count > 0 {
                    return Err(ApiError::BadRequest(
                        "Cannot remove the Uncategorized category while stories are assigned to it"
                            .to_string(),
                    ));
                }
                diesel::delete(categories::table.find(category_id)).execute(conn)?;
                return Ok(0);
            }

            let fallback_id = find_or_create(conn, UNCATEGORIZED)?;
            let moved = diesel::update(
                stories::table.filter(stories::category_id.eq(category_id)),
            )
            .set(stories::category_id.eq(fallback_id))
            .execute(conn)?;
            diesel::delete(categories::table.find(category_id)).execute(conn)?;
            Ok(moved)
        })
    }
}
