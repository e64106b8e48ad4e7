//! Orchestrated call endpoints and the two-node status view.
//!
//! The `{party}` path segment names the requesting party; unknown parties
//! are 404.

use crate::errors::RcError;
use crate::models::{OrchestrationResponse, StatusResponse};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// `POST /api/{party}/call/initiate`
///
/// ```json
/// { "ok": true, "call_id": "…", "self": { "ok": true, "call": { … } }, "other": { … } }
/// ```
#[instrument(skip_all, name = "rc.api.call_initiate", fields(party = %party))]
pub async fn initiate_call(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
) -> Result<Json<OrchestrationResponse>, RcError> {
    Ok(Json(state.orchestrator.initiate(&party).await?))
}

/// `POST /api/{party}/call/accept`
#[instrument(skip_all, name = "rc.api.call_accept", fields(party = %party))]
pub async fn accept_call(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
) -> Result<Json<OrchestrationResponse>, RcError> {
    Ok(Json(state.orchestrator.accept(&party).await?))
}

/// `POST /api/{party}/call/decline`
#[instrument(skip_all, name = "rc.api.call_decline", fields(party = %party))]
pub async fn decline_call(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
) -> Result<Json<OrchestrationResponse>, RcError> {
    Ok(Json(state.orchestrator.decline(&party).await?))
}

/// `POST /api/{party}/call/end`
#[instrument(skip_all, name = "rc.api.call_end", fields(party = %party))]
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
) -> Result<Json<OrchestrationResponse>, RcError> {
    Ok(Json(state.orchestrator.end(&party).await?))
}

/// `POST /api/{party}/call/reset`
#[instrument(skip_all, name = "rc.api.call_reset", fields(party = %party))]
pub async fn reset_call(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
) -> Result<Json<OrchestrationResponse>, RcError> {
    Ok(Json(state.orchestrator.reset(&party).await?))
}

/// `GET /api/{party}/status`
#[instrument(skip_all, name = "rc.api.status", fields(party = %party))]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
) -> Result<Json<StatusResponse>, RcError> {
    Ok(Json(state.orchestrator.status(&party).await?))
}
