//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It implements
//! `axum::response::IntoResponse` to produce the JSON error body every client
//! checks: `{"success": false, "error": <message>, "code": <CODE>}`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use cgraph_storage::StorageError;
use cgraph_sync::SyncError;

/// Body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: &'static str,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource conflict (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalError(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::InternalError(msg) = &self {
            tracing::error!(error = %msg, "request failed");
        }
        let body = ApiErrorBody {
            success: false,
            error: self.message().to_string(),
            code: self.code(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(_) | SyncError::DanglingReference(_) => {
                ApiError::BadRequest(err.to_string())
            }
            SyncError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            SyncError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            SyncError::Store(store) => ApiError::from(store),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StorageError::IntegrityError { .. }
            | StorageError::SequenceResetInTransaction { .. } => {
                ApiError::Conflict(err.to_string())
            }
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
