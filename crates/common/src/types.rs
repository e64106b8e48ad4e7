//! Call-signaling wire types.
//!
//! Every type here is serialized by the kiosk node and deserialized by the
//! remote controller (and by tests), so field names are part of the HTTP
//! contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a call on one node.
///
/// `Idle` is never stored: a node with no session reports `idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No call on this node.
    Idle,
    /// This node started the call and is waiting for the other side.
    OutgoingRinging,
    /// The other side is calling this node.
    IncomingRinging,
    /// The call was accepted; media is being set up.
    Connecting,
    /// Media is flowing.
    InCall,
    /// The call is over.
    Ended,
}

impl CallState {
    /// Returns the wire representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::OutgoingRinging => "outgoing_ringing",
            CallState::IncomingRinging => "incoming_ringing",
            CallState::Connecting => "connecting",
            CallState::InCall => "in_call",
            CallState::Ended => "ended",
        }
    }

    /// Whether a new call may replace a session in this state.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, CallState::Idle | CallState::Ended)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the single call session held by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSessionView {
    /// Caller-assigned identifier shared by both nodes.
    pub call_id: String,

    /// Current state of the session.
    pub state: CallState,

    /// When the session was created on this node.
    pub created_at: DateTime<Utc>,
}

/// Response of `GET /call/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStateResponse {
    /// Current state (`idle` when there is no session).
    pub state: CallState,

    /// The session, or `null` when idle.
    pub call: Option<CallSessionView>,
}

impl CallStateResponse {
    /// The response for a node without a session.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            state: CallState::Idle,
            call: None,
        }
    }

    /// The call id of the active session, if any.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        self.call.as_ref().map(|call| call.call_id.as_str())
    }
}

impl From<Option<CallSessionView>> for CallStateResponse {
    fn from(session: Option<CallSessionView>) -> Self {
        match session {
            Some(call) => Self {
                state: call.state,
                call: Some(call),
            },
            None => Self::idle(),
        }
    }
}

/// Body of every call action that names a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallActionRequest {
    /// Session the action applies to.
    pub call_id: String,
}

/// Response of a node-level call action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallActionResponse {
    /// Always `true` for successful actions.
    pub ok: bool,

    /// The resulting session (absent for actions that clear it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallSessionView>,
}

/// Why a session was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The callee declined the incoming call.
    Declined,
    /// Either side hung up.
    Ended,
    /// Manual recovery cleared the node.
    Reset,
}

/// Output level and mute flag of a node's audio sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStatus {
    /// Output level, 0..=100.
    pub volume_percent: u8,

    /// Whether the sink is muted.
    pub muted: bool,
}

/// Body of `POST /reaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRequest {
    /// Short text shown on the frame.
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_call_state_serialization() {
        let json = serde_json::to_string(&CallState::OutgoingRinging).unwrap();
        assert_eq!(json, "\"outgoing_ringing\"");

        let state: CallState = serde_json::from_str("\"in_call\"").unwrap();
        assert_eq!(state, CallState::InCall);
    }

    #[test]
    fn test_call_state_as_str_matches_serde() {
        for state in [
            CallState::Idle,
            CallState::OutgoingRinging,
            CallState::IncomingRinging,
            CallState::Connecting,
            CallState::InCall,
            CallState::Ended,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn test_is_available() {
        assert!(CallState::Idle.is_available());
        assert!(CallState::Ended.is_available());
        assert!(!CallState::OutgoingRinging.is_available());
        assert!(!CallState::IncomingRinging.is_available());
        assert!(!CallState::Connecting.is_available());
        assert!(!CallState::InCall.is_available());
    }

    #[test]
    fn test_idle_state_response_serializes_null_call() {
        let json = serde_json::to_value(CallStateResponse::idle()).unwrap();
        assert_eq!(json["state"], "idle");
        assert!(json["call"].is_null());
    }

    #[test]
    fn test_state_response_from_session() {
        let view = CallSessionView {
            call_id: "call-1".to_string(),
            state: CallState::IncomingRinging,
            created_at: Utc::now(),
        };

        let response = CallStateResponse::from(Some(view));
        assert_eq!(response.state, CallState::IncomingRinging);
        assert_eq!(response.call_id(), Some("call-1"));
        assert_eq!(CallStateResponse::from(None).call_id(), None);
    }

    #[test]
    fn test_action_response_omits_missing_call() {
        let json = serde_json::to_string(&CallActionResponse {
            ok: true,
            call: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"ok":true}"#);

        let parsed: CallActionResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(parsed.call.is_none());
    }

    #[test]
    fn test_end_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&EndReason::Declined).unwrap(),
            "\"declined\""
        );
        assert_eq!(serde_json::to_string(&EndReason::Reset).unwrap(), "\"reset\"");
    }
}
