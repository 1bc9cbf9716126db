use axum::{
    Router,
    extract::{Json, Multipart, Path, State},
    http::{HeaderMap, HeaderName, StatusCode, header},
    response::Json as ResponseJson,
    routing::{delete, patch, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{self, AdminSession};
use crate::errors::ApiError;
use crate::import::{Delimiter, ImportReport, build_report, parse_rows, prepare_rows};
use crate::models::StoryRecord;
use crate::validation::StoryDraft;
use crate::{
    AppState,
    repositories::{CategoriesRepository, StoriesRepository},
};

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    token: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    is_authenticated: bool,
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct StoryPayload {
    title: Option<String>,
    url: Option<String>,
    category: Option<String>,
    author: Option<String>,
    description: Option<String>,
    publication_month: Option<i32>,
    publication_year: Option<i32>,
}

impl StoryPayload {
    fn into_draft(self) -> Result<StoryDraft, ApiError> {
        let draft = StoryDraft::new(
            self.title.as_deref().unwrap_or_default(),
            self.url.as_deref().unwrap_or_default(),
            self.category.as_deref().unwrap_or_default(),
            self.author.as_deref(),
            self.description.as_deref(),
        )?
        .with_publication(self.publication_month, self.publication_year);
        Ok(draft)
    }
}

#[derive(Debug, Serialize)]
struct DeleteStoryResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteSelectedRequest {
    ids: Option<Vec<i32>>,
}

#[derive(Debug, Serialize)]
struct BulkDeleteResponse {
    success: bool,
    message: String,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct ImportTextRequest {
    csv_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateCategoryRequest {
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateCategoryResponse {
    success: bool,
    message: &'static str,
    category: String,
}

#[derive(Debug, Deserialize)]
struct RenameCategoryRequest {
    new_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct RenameCategoryResponse {
    success: bool,
    message: &'static str,
    updated_count: usize,
}

#[derive(Debug, Deserialize)]
struct DeleteCategoryRequest {
    delete_stories: Option<bool>,
}

#[derive(Debug, Serialize)]
struct DeleteCategoryResponse {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_stories_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_stories_count: Option<usize>,
}

#[instrument(skip_all)]
async fn login<S: AppState>(
    State(state): State<S>,
    Json(payload): Json<LoginRequest>,
) -> Result<([(HeaderName, String); 1], ResponseJson<LoginResponse>), ApiError> {
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if !state.auth().verify_credentials(&username, &password) {
        warn!("Rejected admin login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.auth().issue_token().map_err(|err| {
        error!(error = %err, "Failed to sign session token");
        ApiError::Internal
    })?;
    let cookie = state.auth().session_cookie(&token);

    info!("Admin session issued");
    Ok((
        [(header::SET_COOKIE, cookie)],
        ResponseJson(LoginResponse {
            success: true,
            token,
        }),
    ))
}

/// Reports whether the caller holds a valid session. Always 200 so
/// the dashboard can poll it without tripping error handling.
#[instrument(skip_all)]
async fn session<S: AppState>(
    State(state): State<S>,
    headers: HeaderMap,
) -> ResponseJson<SessionResponse> {
    let is_authenticated = auth::token_from_headers(&headers)
        .and_then(|token| state.auth().verify_token(token))
        .is_some();

    debug!(is_authenticated, "Session check");
    ResponseJson(SessionResponse { is_authenticated })
}

#[instrument(skip_all)]
async fn logout<S: AppState>(
    State(state): State<S>,
) -> ([(HeaderName, String); 1], ResponseJson<LogoutResponse>) {
    info!("Admin session cleared");
    (
        [(header::SET_COOKIE, state.auth().logout_cookie())],
        ResponseJson(LogoutResponse { success: true }),
    )
}

#[instrument(skip_all, fields(url = ?payload.url, category = ?payload.category))]
async fn create_story<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Json(payload): Json<StoryPayload>,
) -> Result<(StatusCode, ResponseJson<StoryRecord>), ApiError> {
    debug!("Processing create story request");

    let draft = payload.into_draft()?;
    let record = state.story_repo().create(&draft).await?;

    info!(id = record.id, "Successfully created story");
    Ok((StatusCode::CREATED, ResponseJson(record)))
}

#[instrument(skip_all, fields(id = %id))]
async fn update_story<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Path(id): Path<i32>,
    Json(payload): Json<StoryPayload>,
) -> Result<ResponseJson<StoryRecord>, ApiError> {
    debug!("Processing update story request");

    let draft = payload.into_draft()?;
    let updated = state.story_repo().update(id, &draft).await?;

    match updated {
        Some(record) => {
            info!(id = record.id, "Successfully updated story");
            Ok(ResponseJson(record))
        }
        None => {
            debug!("Story not found");
            Err(ApiError::StoryNotFound)
        }
    }
}

#[instrument(skip_all, fields(id = %id))]
async fn delete_story<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Path(id): Path<i32>,
) -> Result<ResponseJson<DeleteStoryResponse>, ApiError> {
    let deleted = state.story_repo().delete(id).await?;

    if !deleted {
        debug!("Story not found");
        return Err(ApiError::StoryNotFound);
    }

    info!(id, "Story deleted");
    Ok(ResponseJson(DeleteStoryResponse { success: true }))
}

#[instrument(skip_all)]
async fn delete_selected<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Json(payload): Json<DeleteSelectedRequest>,
) -> Result<ResponseJson<BulkDeleteResponse>, ApiError> {
    let ids = payload.ids.unwrap_or_default();
    if ids.is_empty() {
        return Err(ApiError::BadRequest("No story IDs provided".to_string()));
    }

    let count = state.story_repo().delete_many(&ids).await?;

    info!(requested = ids.len(), count, "Deleted selected stories");
    Ok(ResponseJson(BulkDeleteResponse {
        success: true,
        message: format!("Deleted {count} stories"),
        count,
    }))
}

#[instrument(skip_all)]
async fn clear_stories<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
) -> Result<ResponseJson<BulkDeleteResponse>, ApiError> {
    let count = state.story_repo().clear().await?;

    info!(count, "Cleared all stories");
    Ok(ResponseJson(BulkDeleteResponse {
        success: true,
        message: format!("Deleted {count} stories"),
        count,
    }))
}

#[instrument(skip_all, fields(id = %id))]
async fn toggle_favorite<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Path(id): Path<i32>,
) -> Result<ResponseJson<StoryRecord>, ApiError> {
    let updated = state.story_repo().toggle_favorited(id).await?;

    match updated {
        Some(record) => {
            info!(id = record.id, favorited = record.favorited, "Toggled favorite flag");
            Ok(ResponseJson(record))
        }
        None => {
            debug!("Story not found");
            Err(ApiError::StoryNotFound)
        }
    }
}

async fn run_import<S: AppState>(
    state: &S,
    content: &str,
    delimiter: Delimiter,
) -> Result<ImportReport, ApiError> {
    let rows = parse_rows(content, delimiter)?;
    let (entries, mut reports) = prepare_rows(rows);

    let committed = state.story_repo().import_batch(&entries).await?;
    reports.extend(committed);

    let report = build_report(reports);
    info!(
        total = report.total,
        successful = report.successful,
        duplicates = report.duplicates,
        failed = report.failed,
        "Import completed"
    );
    Ok(report)
}

#[instrument(skip_all)]
async fn import_file<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ImportReport>, ApiError> {
    debug!("Processing CSV file import");

    let mut content: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ApiError::ImportFailed {
            error: "Failed to process CSV file".to_string(),
            details: Some(err.to_string()),
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let bytes = field.bytes().await.map_err(|err| ApiError::ImportFailed {
            error: "Failed to process CSV file".to_string(),
            details: Some(err.to_string()),
        })?;
        let text = String::from_utf8(bytes.to_vec()).map_err(|err| ApiError::ImportFailed {
            error: "CSV parsing failed".to_string(),
            details: Some(err.to_string()),
        })?;
        content = Some(text);
        break;
    }

    let content =
        content.ok_or_else(|| ApiError::BadRequest("No CSV file provided".to_string()))?;

    let report = run_import(&state, &content, Delimiter::Comma).await?;
    Ok(ResponseJson(report))
}

#[instrument(skip_all)]
async fn import_text<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Json(payload): Json<ImportTextRequest>,
) -> Result<ResponseJson<ImportReport>, ApiError> {
    debug!("Processing raw text import");

    let content = payload
        .csv_content
        .ok_or_else(|| ApiError::BadRequest("CSV content is required".to_string()))?;

    let report = run_import(&state, &content, Delimiter::Semicolon).await?;
    Ok(ResponseJson(report))
}

#[instrument(skip_all)]
async fn create_category<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<ResponseJson<CreateCategoryResponse>, ApiError> {
    let name = payload.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Category name is required".to_string()));
    }

    let category = state.category_repo().create(name).await?;

    info!(name = %category.name, "Category created");
    Ok(ResponseJson(CreateCategoryResponse {
        success: true,
        message: "Category created successfully",
        category: category.name,
    }))
}

#[instrument(skip_all, fields(name = %name))]
async fn rename_category<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Path(name): Path<String>,
    Json(payload): Json<RenameCategoryRequest>,
) -> Result<ResponseJson<RenameCategoryResponse>, ApiError> {
    let new_name = payload
        .new_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if new_name.is_empty() {
        return Err(ApiError::BadRequest(
            "New category name is required".to_string(),
        ));
    }

    let updated_count = state.category_repo().rename(&name, new_name).await?;

    info!(new_name, updated_count, "Category renamed");
    Ok(ResponseJson(RenameCategoryResponse {
        success: true,
        message: "Category renamed successfully",
        updated_count,
    }))
}

#[instrument(skip_all, fields(name = %name))]
async fn delete_category<S: AppState>(
    _session: AdminSession,
    State(state): State<S>,
    Path(name): Path<String>,
    Json(payload): Json<DeleteCategoryRequest>,
) -> Result<ResponseJson<DeleteCategoryResponse>, ApiError> {
    let delete_stories = payload.delete_stories.unwrap_or(false);
    let count = state.category_repo().remove(&name, delete_stories).await?;

    let response = if delete_stories {
        info!(deleted_stories = count, "Category and stories deleted");
        DeleteCategoryResponse {
            success: true,
            message: "Category and associated stories deleted",
            deleted_stories_count: Some(count),
            updated_stories_count: None,
        }
    } else {
        info!(reassigned_stories = count, "Category removed");
        DeleteCategoryResponse {
            success: true,
            message: "Category removed, stories set to Uncategorized",
            deleted_stories_count: None,
            updated_stories_count: Some(count),
        }
    };

    Ok(ResponseJson(response))
}

pub fn create_admin_router<S: AppState>() -> Router<S> {
    Router::new()
        .route(
            "/auth",
            post(login::<S>).get(session::<S>).delete(logout::<S>),
        )
        .route("/api/stories", post(create_story::<S>))
        .route("/api/stories/selected", delete(delete_selected::<S>))
        .route("/api/stories/clear", delete(clear_stories::<S>))
        .route("/api/stories/import", post(import_file::<S>))
        .route("/api/stories/import/text", post(import_text::<S>))
        .route(
            "/api/stories/{id}",
            put(update_story::<S>).delete(delete_story::<S>),
        )
        .route("/api/stories/{id}/favorite", patch(toggle_favorite::<S>))
        .route("/api/categories", post(create_category::<S>))
        .route(
            "/api/categories/{name}",
            put(rename_category::<S>).delete(delete_category::<S>),
        )
}
