use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::get,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::ApiError;
use crate::models::StoryRecord;
use crate::repositories::DEFAULT_PAGE_LIMIT;
use crate::{
    AppState,
    repositories::{CategoriesRepository, FavoritesRepository, StoriesRepository, StoryQuery},
};

#[derive(Debug, Deserialize)]
struct ListStoriesQuery {
    limit: Option<u32>,
    offset: Option<u32>,
    category: Option<String>,
    search: Option<String>,
    favorited: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ListStoriesResponse {
    items: Vec<StoryRecord>,
    total: u64,
    limit: u32,
}

#[derive(Debug, Serialize)]
struct AuthorEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    total_stories: u64,
    categories_count: u64,
    latest_created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
struct FavoriteIdsResponse {
    favorite_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct AddFavoriteRequest {
    story_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RemoveFavoriteQuery {
    story_id: Option<i32>,
}

#[derive(Debug, Serialize)]
struct FavoriteActionResponse {
    message: &'static str,
    favorited: bool,
}

/// Favorites are keyed to the caller's network address, the closest
/// thing to an identity the public surface has.
fn client_user_id(headers: &HeaderMap) -> String {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .unwrap_or("unknown");
    format!("user_{ip}")
}

#[instrument(skip_all, fields(limit = query.limit, offset = query.offset, category = ?query.category, has_search = query.search.is_some(), favorited = query.favorited))]
async fn list_stories<S: AppState>(
    State(state): State<S>,
    Query(query): Query<ListStoriesQuery>,
) -> Result<ResponseJson<ListStoriesResponse>, ApiError> {
    debug!("Processing list stories request");

    if let Some(limit) = query.limit {
        if limit == 0 {
            return Err(ApiError::BadRequest(
                "Limit must be greater than 0".to_string(),
            ));
        }
    }

    let params = StoryQuery {
        limit: query.limit,
        offset: query.offset,
        category: query.category,
        search: query.search,
        favorited: query.favorited,
    };

    let page = state.story_repo().list(&params).await?;

    let response = ListStoriesResponse {
        items: page.items,
        total: page.total,
        limit: params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
    };

    info!(
        returned_count = response.items.len(),
        total = response.total,
        "Successfully retrieved story list"
    );

    Ok(ResponseJson(response))
}

#[instrument(skip_all, fields(id = %id))]
async fn get_story<S: AppState>(
    State(state): State<S>,
    Path(id): Path<i32>,
) -> Result<ResponseJson<StoryRecord>, ApiError> {
    debug!("Processing get story by ID request");

    let story = state.story_repo().find_by_id(id).await?;

    match story {
        Some(record) => {
            info!(id = record.id, "Successfully retrieved story");
            Ok(ResponseJson(record))
        }
        None => {
            debug!("Story not found");
            Err(ApiError::StoryNotFound)
        }
    }
}

#[instrument(skip_all)]
async fn list_categories<S: AppState>(
    State(state): State<S>,
) -> Result<ResponseJson<Vec<String>>, ApiError> {
    let names = state.category_repo().list().await?;
    debug!(count = names.len(), "Retrieved category list");
    Ok(ResponseJson(names))
}

#[instrument(skip_all)]
async fn list_authors<S: AppState>(
    State(state): State<S>,
) -> Result<ResponseJson<Vec<AuthorEntry>>, ApiError> {
    let authors = state
        .story_repo()
        .authors()
        .await?
        .into_iter()
        .map(|name| AuthorEntry { name })
        .collect::<Vec<_>>();

    debug!(count = authors.len(), "Retrieved author list");
    Ok(ResponseJson(authors))
}

#[instrument(skip_all)]
async fn get_stats<S: AppState>(
    State(state): State<S>,
) -> Result<ResponseJson<StatsResponse>, ApiError> {
    let stats = state.story_repo().stats().await?;

    Ok(ResponseJson(StatsResponse {
        total_stories: stats.total_stories,
        categories_count: stats.categories_count,
        latest_created_at: stats.latest_created_at,
    }))
}

#[instrument(skip_all)]
async fn list_favorites<S: AppState>(
    State(state): State<S>,
    headers: HeaderMap,
) -> Result<ResponseJson<FavoriteIdsResponse>, ApiError> {
    let user_id = client_user_id(&headers);
    let favorite_ids = state.favorite_repo().ids_for_user(&user_id).await?;

    debug!(count = favorite_ids.len(), "Retrieved favorites");
    Ok(ResponseJson(FavoriteIdsResponse { favorite_ids }))
}

#[instrument(skip_all, fields(story_id = payload.story_id))]
async fn add_favorite<S: AppState>(
    State(state): State<S>,
    headers: HeaderMap,
    Json(payload): Json<AddFavoriteRequest>,
) -> Result<ResponseJson<FavoriteActionResponse>, ApiError> {
    let story_id = payload
        .story_id
        .ok_or_else(|| ApiError::BadRequest("Story ID is required".to_string()))?;

    let user_id = client_user_id(&headers);
    let added = state.favorite_repo().add(story_id, &user_id).await?;

    let message = if added {
        info!(story_id, "Favorite added");
        "Favorite added"
    } else {
        debug!(story_id, "Story already favorited");
        "Already favorited"
    };

    Ok(ResponseJson(FavoriteActionResponse {
        message,
        favorited: true,
    }))
}

#[instrument(skip_all, fields(story_id = query.story_id))]
async fn remove_favorite<S: AppState>(
    State(state): State<S>,
    headers: HeaderMap,
    Query(query): Query<RemoveFavoriteQuery>,
) -> Result<ResponseJson<FavoriteActionResponse>, ApiError> {
    let story_id = query
        .story_id
        .ok_or_else(|| ApiError::BadRequest("Story ID is required".to_string()))?;

    let user_id = client_user_id(&headers);
    state.favorite_repo().remove(story_id, &user_id).await?;

    info!(story_id, "Favorite removed");
    Ok(ResponseJson(FavoriteActionResponse {
        message: "Favorite removed",
        favorited: false,
    }))
}

pub fn create_api_v1_router<S: AppState>() -> Router<S> {
    Router::new()
        .route("/stories", get(list_stories::<S>))
        .route("/stories/{id}", get(get_story::<S>))
        .route("/categories", get(list_categories::<S>))
        .route("/authors", get(list_authors::<S>))
        .route("/stats", get(get_stats::<S>))
        .route(
            "/favorites",
            get(list_favorites::<S>)
                .post(add_favorite::<S>)
                .delete(remove_favorite::<S>),
        )
}
