//! Remote controller error types.
//!
//! Errors map to HTTP status codes via the `IntoResponse` impl and render
//! as `{"error": {"code", "message"}}`. A node leg that fails is reported
//! as `UPSTREAM_FAILURE` naming the party and the node's answer.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Longest node response text carried in an upstream failure.
pub const MAX_UPSTREAM_MESSAGE_CHARS: usize = 300;

/// Remote controller error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - Upstream: 502 Bad Gateway
/// - Internal: 500 Internal Server Error
#[derive(Debug, Clone, Error)]
pub enum RcError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A node request failed: unreachable, timed out, or rejected.
    #[error("{}", upstream_message(.party, .operation, .status, .message))]
    Upstream {
        party: String,
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Internal server error")]
    Internal,
}

fn upstream_message(party: &str, operation: &str, status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!(
            "Frame {} {} failed: {} {}",
            party, operation, status, message
        ),
        None => format!("Frame {} {} failed: {}", party, operation, message),
    }
}

impl RcError {
    /// Build an upstream failure, truncating the node's message.
    pub fn upstream(
        party: impl Into<String>,
        operation: impl Into<String>,
        status: Option<u16>,
        message: &str,
    ) -> Self {
        RcError::Upstream {
            party: party.into(),
            operation: operation.into(),
            status,
            message: message.chars().take(MAX_UPSTREAM_MESSAGE_CHARS).collect(),
        }
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            RcError::BadRequest(_) => 400,
            RcError::NotFound(_) => 404,
            RcError::Conflict(_) => 409,
            RcError::Upstream { .. } => 502,
            RcError::Internal => 500,
        }
    }

    /// Bounded label for the orchestration metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            RcError::BadRequest(_) => "invalid",
            RcError::NotFound(_) => "not_found",
            RcError::Conflict(_) => "conflict",
            RcError::Upstream { .. } => "upstream_failure",
            RcError::Internal => "error",
        }
    }
}

impl From<JsonRejection> for RcError {
    fn from(rejection: JsonRejection) -> Self {
        RcError::BadRequest(rejection.body_text())
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

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            RcError::BadRequest(reason) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone()),
            RcError::NotFound(reason) => (StatusCode::NOT_FOUND, "NOT_FOUND", reason.clone()),
            RcError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            RcError::Upstream { party, .. } => {
                tracing::warn!(target: "rc.upstream", party = %party, error = %self, "Node request failed");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE", self.to_string())
            }
            RcError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
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
