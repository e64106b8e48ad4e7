//! Frame controls: volume, reactions, and the displayed picture.
//!
//! Each successful change is also published on the event stream so the
//! frame's UI updates without polling.

use crate::errors::NodeError;
use crate::models::{
    NodeEvent, OkResponse, PictureEvent, PictureUploadResponse, ReactionEvent, VolumeResponse,
};
use crate::routes::AppState;
use crate::services::PictureStore;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common::types::{ReactionRequest, VolumeStatus};
use std::sync::Arc;
use tracing::{info, instrument};

/// Longest reaction shown on the frame, in characters.
pub const MAX_REACTION_CHARS: usize = 280;

/// Multipart field holding the uploaded picture.
const PICTURE_FIELD: &str = "file";

/// `GET /api/volume`
#[instrument(skip_all, name = "kiosk.api.volume")]
pub async fn get_volume(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VolumeResponse>, NodeError> {
    let status = state.volume.status().await?;
    Ok(Json(status.into()))
}

/// `POST /api/volume/raise`
#[instrument(skip_all, name = "kiosk.api.volume_raise")]
pub async fn raise_volume(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<VolumeResponse>), NodeError> {
    let status = state.volume.raise().await?;
    Ok(volume_changed(&state, status))
}

/// `POST /api/volume/lower`
#[instrument(skip_all, name = "kiosk.api.volume_lower")]
pub async fn lower_volume(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<VolumeResponse>), NodeError> {
    let status = state.volume.lower().await?;
    Ok(volume_changed(&state, status))
}

/// `POST /api/volume/mute` toggles the mute flag.
#[instrument(skip_all, name = "kiosk.api.volume_mute")]
pub async fn toggle_mute(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<VolumeResponse>), NodeError> {
    let status = state.volume.toggle_mute().await?;
    Ok(volume_changed(&state, status))
}

fn volume_changed(state: &AppState, status: VolumeStatus) -> (StatusCode, Json<VolumeResponse>) {
    state.events.publish(&NodeEvent::Volume(status.into()));
    (StatusCode::ACCEPTED, Json(status.into()))
}

/// `POST /api/reaction`
#[instrument(skip_all, name = "kiosk.api.reaction")]
pub async fn post_reaction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OkResponse>), NodeError> {
    let Json(request) = payload?;

    let message = request.message.trim();
    if message.is_empty() {
        return Err(NodeError::BadRequest("message must not be empty".to_string()));
    }
    if message.chars().count() > MAX_REACTION_CHARS {
        return Err(NodeError::BadRequest(format!(
            "message must be at most {} characters",
            MAX_REACTION_CHARS
        )));
    }

    state.events.publish(&NodeEvent::Reaction(ReactionEvent {
        message: message.to_string(),
    }));

    Ok((StatusCode::ACCEPTED, Json(OkResponse { ok: true })))
}

/// `POST /api/picture` (multipart, field `file`)
///
/// Accepts JPEG, PNG and WebP; anything else is 415.
#[instrument(skip_all, name = "kiosk.api.picture")]
pub async fn upload_picture(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PictureUploadResponse>), NodeError> {
    let mut multipart = multipart.map_err(|e| NodeError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| NodeError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if PictureStore::extension_for(&content_type).is_none() {
            return Err(NodeError::UnsupportedMediaType(
                "Use JPEG/PNG/WebP".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| NodeError::BadRequest(e.body_text()))?;

        let url = state.pictures.save(&content_type, &bytes).await?;
        state
            .events
            .publish(&NodeEvent::Picture(PictureEvent { url: url.clone() }));

        info!(target: "kiosk.pictures", url = %url, size = bytes.len(), "Picture uploaded");
        return Ok((
            StatusCode::CREATED,
            Json(PictureUploadResponse { ok: true, url }),
        ));
    }

    Err(NodeError::BadRequest(format!(
        "multipart field '{}' is required",
        PICTURE_FIELD
    )))
}
