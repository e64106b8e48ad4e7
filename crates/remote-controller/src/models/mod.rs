//! Remote controller response models.
//!
//! Orchestrated operations report every node leg inline, so a partially
//! failed operation still returns 200 with the failing leg marked
//! `ok: false`.

use crate::errors::RcError;
use common::types::{CallActionResponse, CallSessionView, CallState, VolumeStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one node leg of an orchestrated operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegOutcome {
    /// Whether the node accepted the request.
    pub ok: bool,

    /// Session returned by the node, when it returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallSessionView>,

    /// Why the leg failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Context for a failure that does not affect the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LegOutcome {
    pub fn completed(response: CallActionResponse) -> Self {
        Self {
            ok: response.ok,
            call: response.call,
            error: None,
            note: None,
        }
    }

    pub fn failed(error: &RcError) -> Self {
        Self {
            ok: false,
            call: None,
            error: Some(error.to_string()),
            note: None,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Response of `POST /api/{party}/call/*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationResponse {
    /// `false` only when a leg the operation depends on failed inline
    /// (the `receive` leg of `initiate`).
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    /// The requesting party's node.
    #[serde(rename = "self")]
    pub self_leg: LegOutcome,

    /// The other party's node, for operations that touch both.
    #[serde(rename = "other", default, skip_serializing_if = "Option::is_none")]
    pub other_leg: Option<LegOutcome>,
}

impl OrchestrationResponse {
    /// Whether any leg failed, reported inline or not.
    pub fn is_partial(&self) -> bool {
        !self.self_leg.ok || self.other_leg.as_ref().is_some_and(|leg| !leg.ok)
    }
}

/// Inline marker for a status read that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineError {
    pub ok: bool,
    pub error: String,
}

impl InlineError {
    /// `what` names the read, e.g. `other volume`.
    pub fn new(what: &str, error: &RcError) -> Self {
        Self {
            ok: false,
            error: format!("{}: {}", what, error),
        }
    }
}

/// Either the value read from a node or why the read failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadOutcome<T> {
    Value(T),
    Failed(InlineError),
}

/// One party's side of `GET /api/{party}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyStatus {
    pub volume: ReadOutcome<VolumeStatus>,

    /// `null` when the call state could not be read.
    pub call_state: Option<CallState>,

    pub call: Option<CallSessionView>,

    /// Why the call state could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_error: Option<InlineError>,
}

/// Response of `GET /api/{party}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "self")]
    pub self_status: PartyStatus,

    pub other: PartyStatus,
}

/// Response of the volume pass-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub ok: bool,
    pub volume_percent: u8,
    pub muted: bool,
}

impl From<VolumeStatus> for VolumeResponse {
    fn from(status: VolumeStatus) -> Self {
        Self {
            ok: true,
            volume_percent: status.volume_percent,
            muted: status.muted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Liveness response for `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Response of `/api/health`: configured frames per party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealthResponse {
    pub ok: bool,

    /// Node API base URL per party.
    pub frames: BTreeMap<String, String>,

    /// Whether access headers are attached to requests for each party.
    pub access_tokens_configured: BTreeMap<String, bool>,
}
