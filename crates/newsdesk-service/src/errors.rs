use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] crate::validation::ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized - admin access required")]
    Unauthorized,

    #[error("Story not found")]
    StoryNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("URL already exists")]
    DuplicateUrl,

    #[error("Category already exists")]
    CategoryExists,

    #[error("Internal server error")]
    Internal,

    /// Structural import failure: the whole request is rejected before
    /// any per-row report exists.
    #[error("{error}")]
    ImportFailed {
        error: String,
        details: Option<String>,
    },
}

impl From<crate::import::ImportError> for ApiError {
    fn from(err: crate::import::ImportError) -> Self {
        use crate::import::ImportError;

        match err {
            ImportError::Empty => ApiError::ImportFailed {
                error: err.to_string(),
                details: None,
            },
            ImportError::Parse(source) => ApiError::ImportFailed {
                error: "CSV parsing failed".to_string(),
                details: Some(source.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::ImportFailed { error, details } => {
                let mut body = json!({ "error": error });
                if let Some(details) = details {
                    body["details"] = json!(details);
                }
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            ApiError::Validation(ref err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::BadRequest(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::InvalidCredentials | ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::StoryNotFound | ApiError::CategoryNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::DuplicateUrl | ApiError::CategoryExists => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::Database(ref err) => {
                // Log the detailed error but don't expose it to the client
                error!(error = %err, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
