use std::sync::{Arc, Mutex};

use axum::Router;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};

use crate::auth::AuthContext;
use crate::repositories::{
    CategoriesRepository, FavoritesRepository, SqliteCategoriesRepository,
    SqliteFavoritesRepository, SqliteStoriesRepository, StoriesRepository,
};

pub mod auth;
pub mod config;
pub mod errors;
pub mod import;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod schema;
pub mod shutdown;
pub mod validation;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Everything the routers need from the application state. Handlers
/// are generic over this so tests can swap in their own repositories.
pub trait AppState: Clone + Send + Sync + 'static {
    type Stories: StoriesRepository;
    type Categories: CategoriesRepository;
    type Favorites: FavoritesRepository;

    fn story_repo(&self) -> &Self::Stories;
    fn category_repo(&self) -> &Self::Categories;
    fn favorite_repo(&self) -> &Self::Favorites;
    fn auth(&self) -> &AuthContext;
}

#[derive(Clone)]
pub struct DefaultAppState {
    stories: SqliteStoriesRepository,
    categories: SqliteCategoriesRepository,
    favorites: SqliteFavoritesRepository,
    auth: Arc<AuthContext>,
}

impl DefaultAppState {
    pub fn new(db: Arc<Mutex<SqliteConnection>>, auth: AuthContext) -> Self {
        Self {
            stories: SqliteStoriesRepository::new(db.clone()),
            categories: SqliteCategoriesRepository::new(db.clone()),
            favorites: SqliteFavoritesRepository::new(db),
            auth: Arc::new(auth),
        }
    }
}

impl AppState for DefaultAppState {
    type Stories = SqliteStoriesRepository;
    type Categories = SqliteCategoriesRepository;
    type Favorites = SqliteFavoritesRepository;

    fn story_repo(&self) -> &Self::Stories {
        &self.stories
    }

    fn category_repo(&self) -> &Self::Categories {
        &self.categories
    }

    fn favorite_repo(&self) -> &Self::Favorites {
        &self.favorites
    }

    fn auth(&self) -> &AuthContext {
        &self.auth
    }
}

pub fn create_app(state: DefaultAppState, admin_path: &str) -> Router {
    routes::create_router(admin_path).with_state(state)
}
