//! Call signaling handlers.
//!
//! Thin wrappers over [`CallStateMachine`](crate::services::CallStateMachine):
//! successful actions answer `202 Accepted` with `{"ok": true, ...}`,
//! guard failures map to 404/409 via [`NodeError`].

use crate::errors::NodeError;
use crate::routes::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common::types::{CallActionRequest, CallActionResponse, CallStateResponse};
use std::sync::Arc;

type Accepted = (StatusCode, Json<CallActionResponse>);

fn accepted(call: Option<common::types::CallSessionView>) -> Accepted {
    (
        StatusCode::ACCEPTED,
        Json(CallActionResponse { ok: true, call }),
    )
}

/// `GET /api/call/state`
#[tracing::instrument(skip_all, name = "kiosk.api.call_state")]
pub async fn get_call_state(State(state): State<Arc<AppState>>) -> Json<CallStateResponse> {
    Json(state.calls.snapshot().await)
}

/// `POST /api/call/initiate`
#[tracing::instrument(skip_all, name = "kiosk.api.initiate")]
pub async fn initiate_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallActionRequest>, JsonRejection>,
) -> Result<Accepted, NodeError> {
    let Json(request) = payload?;
    let call = state.calls.initiate(&request.call_id).await?;
    Ok(accepted(Some(call)))
}

/// `POST /api/call/receive`
#[tracing::instrument(skip_all, name = "kiosk.api.receive")]
pub async fn receive_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallActionRequest>, JsonRejection>,
) -> Result<Accepted, NodeError> {
    let Json(request) = payload?;
    let call = state.calls.receive(&request.call_id).await?;
    Ok(accepted(Some(call)))
}

/// `POST /api/call/accept`
#[tracing::instrument(skip_all, name = "kiosk.api.accept")]
pub async fn accept_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallActionRequest>, JsonRejection>,
) -> Result<Accepted, NodeError> {
    let Json(request) = payload?;
    let call = state.calls.accept(&request.call_id).await?;
    Ok(accepted(Some(call)))
}

/// `POST /api/call/decline`
#[tracing::instrument(skip_all, name = "kiosk.api.decline")]
pub async fn decline_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallActionRequest>, JsonRejection>,
) -> Result<Accepted, NodeError> {
    let Json(request) = payload?;
    state.calls.decline(&request.call_id).await?;
    Ok(accepted(None))
}

/// `POST /api/call/end`
#[tracing::instrument(skip_all, name = "kiosk.api.end")]
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallActionRequest>, JsonRejection>,
) -> Result<Accepted, NodeError> {
    let Json(request) = payload?;
    state.calls.end(&request.call_id).await?;
    Ok(accepted(None))
}

/// `POST /api/call/reset`. Any request body is ignored.
#[tracing::instrument(skip_all, name = "kiosk.api.reset")]
pub async fn reset_call(State(state): State<Arc<AppState>>) -> Accepted {
    state.calls.reset().await;
    accepted(None)
}
