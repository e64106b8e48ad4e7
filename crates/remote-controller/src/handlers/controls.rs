//! Frame controls forwarded to the *other* party's node.

use crate::errors::RcError;
use crate::models::{OkResponse, VolumeResponse};
use crate::routes::AppState;
use crate::services::{PictureStored, PictureUpload, VolumeAction};
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use common::types::ReactionRequest;
use std::sync::Arc;
use tracing::instrument;

/// Largest picture accepted for forwarding.
pub const MAX_PICTURE_BYTES: usize = 20 * 1024 * 1024;

const PICTURE_FIELD: &str = "file";

/// `POST /api/{party}/volume/{action}` where action is `raise`, `lower` or `mute`.
#[instrument(skip_all, name = "rc.api.volume", fields(party = %party, action = %action))]
pub async fn change_volume(
    State(state): State<Arc<AppState>>,
    Path((party, action)): Path<(String, String)>,
) -> Result<Json<VolumeResponse>, RcError> {
    let action: VolumeAction = action.parse()?;
    let status = state.orchestrator.volume(&party, action).await?;
    Ok(Json(status.into()))
}

/// `POST /api/{party}/reaction`
#[instrument(skip_all, name = "rc.api.reaction", fields(party = %party))]
pub async fn send_reaction(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, RcError> {
    let Json(request) = payload?;
    state
        .orchestrator
        .reaction(&party, &request.message)
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

/// `POST /api/{party}/picture` (multipart, field `file`)
///
/// The file is forwarded as-is; the receiving node validates its type.
#[instrument(skip_all, name = "rc.api.picture", fields(party = %party))]
pub async fn send_picture(
    State(state): State<Arc<AppState>>,
    Path(party): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PictureStored>, RcError> {
    // Unknown parties are rejected before the body is read.
    state.orchestrator.pair(&party)?;

    let mut multipart = multipart.map_err(|e| RcError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RcError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| RcError::BadRequest(e.body_text()))?;

        let upload = PictureUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        };
        return Ok(Json(state.orchestrator.picture(&party, upload).await?));
    }

    Err(RcError::BadRequest(format!(
        "multipart field '{}' is required",
        PICTURE_FIELD
    )))
}
