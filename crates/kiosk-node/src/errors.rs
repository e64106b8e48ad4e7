//! Kiosk node error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl and
//! render as `{"error": {"code", "message"}}`. Sound-system and storage
//! failures are logged server-side and reported to clients generically.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Kiosk node error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - UnsupportedMediaType: 415 Unsupported Media Type
/// - Volume, Storage: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Volume control failed: {0}")]
    Volume(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl NodeError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            NodeError::BadRequest(_) => 400,
            NodeError::NotFound(_) => 404,
            NodeError::Conflict(_) => 409,
            NodeError::UnsupportedMediaType(_) => 415,
            NodeError::Volume(_) | NodeError::Storage(_) => 500,
        }
    }

    /// Bounded label for the call transition metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            NodeError::BadRequest(_) => "invalid",
            NodeError::NotFound(_) => "not_found",
            NodeError::Conflict(_) => "conflict",
            _ => "error",
        }
    }
}

impl From<JsonRejection> for NodeError {
    fn from(rejection: JsonRejection) -> Self {
        NodeError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            NodeError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            NodeError::NotFound(reason) => (StatusCode::NOT_FOUND, "NOT_FOUND", reason.clone()),
            NodeError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            NodeError::UnsupportedMediaType(reason) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                reason.clone(),
            ),
            NodeError::Volume(err) => {
                tracing::error!(target: "kiosk.volume", error = %err, "Volume command failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "VOLUME_UNAVAILABLE",
                    "Volume control is unavailable".to_string(),
                )
            }
            NodeError::Storage(err) => {
                tracing::error!(target: "kiosk.pictures", error = %err, "Picture storage failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "Failed to store picture".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
