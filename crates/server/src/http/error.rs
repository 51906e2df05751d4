use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::protocol::ApiResponse;
use storage::RepoError;

pub const INTERNAL_ERROR: &str = "Internal server error";

/// Error leaving a handler. The body is always `{ success: false, error }`
/// and never carries internal error details.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Client-caused repository failures keep their message; `not_found`
    /// picks the status for missing records, which differs per endpoint.
    /// Storage faults are logged here and answered with a generic 500.
    pub fn from_repo(err: RepoError, not_found: StatusCode, context: &str) -> Self {
        match err {
            RepoError::CommentNotFound | RepoError::ReplyNotFound => {
                Self::new(not_found, err.to_string())
            }
            RepoError::Validation(_) => Self::bad_request(err.to_string()),
            RepoError::Conflict { .. } | RepoError::Storage(_) => {
                tracing::error!("{}: {}", context, err);
                Self::internal(INTERNAL_ERROR)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}
