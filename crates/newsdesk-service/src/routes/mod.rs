use crate::AppState;
use axum::Router;
use axum::routing::get;

pub mod admin;
pub mod api;

async fn health() -> &'static str {
    "OK"
}

/// Builds the full application router. The admin surface is nested
/// under the configured secret path; every other prefix is a plain
/// 404, so the path itself acts as a first gate in front of the
/// token check.
pub fn create_router<S: AppState>(admin_path: &str) -> Router<S> {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api::create_api_router())
        .nest(&format!("/{admin_path}"), admin::create_admin_router())
}
