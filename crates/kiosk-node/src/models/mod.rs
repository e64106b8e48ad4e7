//! Kiosk node models.
//!
//! Events pushed over `/api/events` and response bodies that only the
//! node produces. Call-signaling types shared with the remote controller
//! live in `common::types`.

use common::types::{CallSessionView, CallState, EndReason, VolumeStatus};
use serde::{Deserialize, Serialize};

/// An event delivered to every subscriber of the node's event stream.
///
/// Serialized as `{"event": "<kind>", "data": {...}}`; each value becomes
/// the `data:` line of one SSE message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum NodeEvent {
    /// Output level or mute changed.
    Volume(VolumeEvent),
    /// The call session changed.
    Call(CallEvent),
    /// A short text reaction to show on the frame.
    Reaction(ReactionEvent),
    /// A new picture was uploaded.
    Picture(PictureEvent),
}

impl NodeEvent {
    /// Bounded event kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeEvent::Volume(_) => "volume",
            NodeEvent::Call(_) => "call",
            NodeEvent::Reaction(_) => "reaction",
            NodeEvent::Picture(_) => "picture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEvent {
    pub volume_percent: u8,
    pub muted: bool,
}

impl From<VolumeStatus> for VolumeEvent {
    fn from(status: VolumeStatus) -> Self {
        Self {
            volume_percent: status.volume_percent,
            muted: status.muted,
        }
    }
}

/// Snapshot published after every call transition.
///
/// Transitions that clear the session publish `state: idle`, `call: null`
/// and say why in `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    pub state: CallState,
    pub call: Option<CallSessionView>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<EndReason>,

    /// Id of the session that was just cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_call_id: Option<String>,
}

impl CallEvent {
    /// Event for a session that exists after the transition.
    pub fn snapshot(view: &CallSessionView) -> Self {
        Self {
            state: view.state,
            call: Some(view.clone()),
            reason: None,
            ended_call_id: None,
        }
    }

    /// Event for a transition that left the node idle.
    pub fn cleared(reason: EndReason, ended_call_id: Option<String>) -> Self {
        Self {
            state: CallState::Idle,
            call: None,
            reason: Some(reason),
            ended_call_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureEvent {
    /// Path under which the picture is served, e.g. `/pics/current.jpg`.
    pub url: String,
}

/// Response of the volume endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// Response of `POST /api/picture`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureUploadResponse {
    pub ok: bool,
    pub url: String,
}

/// Response of `POST /api/reaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests.
    pub status: String,

    /// Current call state of the node.
    pub call_state: CallState,

    /// Number of connected event stream subscribers.
    pub subscribers: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_volume_event_wire_format() {
        let event = NodeEvent::Volume(VolumeEvent {
            volume_percent: 40,
            muted: false,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "volume");
        assert_eq!(json["data"]["volume_percent"], 40);
        assert_eq!(json["data"]["muted"], false);
    }

    #[test]
    fn test_call_snapshot_event_omits_reason() {
        let view = CallSessionView {
            call_id: "c1".to_string(),
            state: CallState::IncomingRinging,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(NodeEvent::Call(CallEvent::snapshot(&view))).unwrap();
        assert_eq!(json["event"], "call");
        assert_eq!(json["data"]["state"], "incoming_ringing");
        assert_eq!(json["data"]["call"]["call_id"], "c1");
        assert!(json["data"].get("reason").is_none());
        assert!(json["data"].get("ended_call_id").is_none());
    }

    #[test]
    fn test_cleared_call_event() {
        let event = CallEvent::cleared(EndReason::Declined, Some("c1".to_string()));

        let json = serde_json::to_value(NodeEvent::Call(event)).unwrap();
        assert_eq!(json["data"]["state"], "idle");
        assert!(json["data"]["call"].is_null());
        assert_eq!(json["data"]["reason"], "declined");
        assert_eq!(json["data"]["ended_call_id"], "c1");
    }

    #[test]
    fn test_event_kinds() {
        let reaction = NodeEvent::Reaction(ReactionEvent {
            message: "hi".to_string(),
        });
        let picture = NodeEvent::Picture(PictureEvent {
            url: "/pics/current.png".to_string(),
        });

        assert_eq!(reaction.kind(), "reaction");
        assert_eq!(picture.kind(), "picture");

        let parsed: NodeEvent =
            serde_json::from_str(&serde_json::to_string(&picture).unwrap()).unwrap();
        assert_eq!(parsed, picture);
    }
}
