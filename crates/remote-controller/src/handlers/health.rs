//! Health endpoints.

use crate::models::{ApiHealthResponse, HealthResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// `GET /health` liveness probe. Nodes are not contacted.
#[instrument(skip_all, name = "rc.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// `GET /api/health`
///
/// ```json
/// {
///   "ok": true,
///   "frames": { "adam": "https://adam.example.com/api", "steve": "…" },
///   "access_tokens_configured": { "adam": true, "steve": false }
/// }
/// ```
#[instrument(skip_all, name = "rc.health.frames")]
pub async fn api_health(State(state): State<Arc<AppState>>) -> Json<ApiHealthResponse> {
    let parties = state.config.parties();

    Json(ApiHealthResponse {
        ok: true,
        frames: parties
            .iter()
            .map(|party| (party.name.clone(), party.frame_api.clone()))
            .collect(),
        access_tokens_configured: parties
            .iter()
            .map(|party| (party.name.clone(), party.access.is_some()))
            .collect(),
    })
}
