//! Liveness endpoint.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// `GET /health`
///
/// ```json
/// { "status": "healthy", "call_state": "idle", "subscribers": 1 }
/// ```
#[instrument(skip_all, name = "kiosk.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.calls.snapshot().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        call_state: snapshot.state,
        subscribers: state.events.subscriber_count(),
    })
}
