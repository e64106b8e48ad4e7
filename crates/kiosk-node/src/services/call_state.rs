//! Per-node call state machine.
//!
//! A node holds at most one call session. Transitions:
//!
//! ```text
//! (idle|ended) --initiate--> outgoing_ringing
//! (idle|ended) --receive---> incoming_ringing
//! incoming_ringing --accept--> connecting
//! incoming_ringing --decline-> idle   (reason: declined)
//! any session --end---------> idle   (reason: ended)
//! anything --reset----------> idle   (reason: reset)
//! ```
//!
//! Every successful transition publishes a call event. Events are published
//! while the session lock is held, so subscribers observe them in the same
//! order the transitions were applied.

use crate::errors::NodeError;
use crate::models::{CallEvent, NodeEvent};
use crate::observability::metrics::record_call_transition;
use crate::services::event_bus::EventBus;
use chrono::{DateTime, Utc};
use common::types::{CallSessionView, CallState, CallStateResponse, EndReason};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
struct CallSession {
    call_id: String,
    state: CallState,
    created_at: DateTime<Utc>,
}

impl CallSession {
    fn new(call_id: &str, state: CallState) -> Self {
        Self {
            call_id: call_id.to_string(),
            state,
            created_at: Utc::now(),
        }
    }

    fn view(&self) -> CallSessionView {
        CallSessionView {
            call_id: self.call_id.clone(),
            state: self.state,
            created_at: self.created_at,
        }
    }
}

/// Guards the node's single call session.
pub struct CallStateMachine {
    session: Mutex<Option<CallSession>>,
    events: Arc<EventBus>,
}

impl CallStateMachine {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            session: Mutex::new(None),
            events,
        }
    }

    /// Current state, `idle` with no call when there is no session.
    pub async fn snapshot(&self) -> CallStateResponse {
        let session = self.session.lock().await;
        CallStateResponse::from(session.as_ref().map(CallSession::view))
    }

    /// Start an outgoing call on this node.
    #[instrument(skip(self), name = "kiosk.call.initiate")]
    pub async fn initiate(&self, call_id: &str) -> Result<CallSessionView, NodeError> {
        let result = self.start(call_id, CallState::OutgoingRinging).await;
        record("initiate", &result);
        result
    }

    /// Register an incoming call on this node.
    #[instrument(skip(self), name = "kiosk.call.receive")]
    pub async fn receive(&self, call_id: &str) -> Result<CallSessionView, NodeError> {
        let result = self.start(call_id, CallState::IncomingRinging).await;
        record("receive", &result);
        result
    }

    /// Accept the ringing incoming call.
    #[instrument(skip(self), name = "kiosk.call.accept")]
    pub async fn accept(&self, call_id: &str) -> Result<CallSessionView, NodeError> {
        let result = self.try_accept(call_id).await;
        record("accept", &result);
        result
    }

    /// Decline the ringing incoming call.
    #[instrument(skip(self), name = "kiosk.call.decline")]
    pub async fn decline(&self, call_id: &str) -> Result<(), NodeError> {
        let result = self.try_decline(call_id).await;
        record("decline", &result);
        result
    }

    /// End the session, whatever state it is in.
    #[instrument(skip(self), name = "kiosk.call.end")]
    pub async fn end(&self, call_id: &str) -> Result<(), NodeError> {
        let result = self.try_end(call_id).await;
        record("end", &result);
        result
    }

    /// Clear the node unconditionally.
    #[instrument(skip(self), name = "kiosk.call.reset")]
    pub async fn reset(&self) {
        let mut session = self.session.lock().await;
        let previous = session.take();
        let ended_call_id = previous.map(|s| s.call_id);

        self.events.publish(&NodeEvent::Call(CallEvent::cleared(
            EndReason::Reset,
            ended_call_id.clone(),
        )));
        drop(session);

        record_call_transition("reset", "success");
        info!(target: "kiosk.call", ended_call_id = ?ended_call_id, "Node reset");
    }

    async fn start(&self, call_id: &str, state: CallState) -> Result<CallSessionView, NodeError> {
        validate_call_id(call_id)?;

        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            if !existing.state.is_available() {
                warn!(
                    target: "kiosk.call",
                    call_id = %call_id,
                    current_call_id = %existing.call_id,
                    current_state = %existing.state,
                    "Rejecting call, node is busy"
                );
                return Err(NodeError::Conflict(format!(
                    "Busy: call {} is {}",
                    existing.call_id, existing.state
                )));
            }
        }

        let created = CallSession::new(call_id, state);
        let view = created.view();
        *session = Some(created);
        self.events
            .publish(&NodeEvent::Call(CallEvent::snapshot(&view)));

        info!(target: "kiosk.call", call_id = %call_id, state = %state, "Call session created");
        Ok(view)
    }

    async fn try_accept(&self, call_id: &str) -> Result<CallSessionView, NodeError> {
        validate_call_id(call_id)?;

        let mut guard = self.session.lock().await;
        let current = matching_session(guard.as_mut(), call_id)?;
        if current.state != CallState::IncomingRinging {
            return Err(NodeError::Conflict(format!(
                "Cannot accept from state={}",
                current.state
            )));
        }

        current.state = CallState::Connecting;
        let view = current.view();
        self.events
            .publish(&NodeEvent::Call(CallEvent::snapshot(&view)));

        info!(target: "kiosk.call", call_id = %call_id, "Call accepted");
        Ok(view)
    }

    async fn try_decline(&self, call_id: &str) -> Result<(), NodeError> {
        validate_call_id(call_id)?;

        let mut guard = self.session.lock().await;
        let current = matching_session(guard.as_mut(), call_id)?;
        if current.state != CallState::IncomingRinging {
            return Err(NodeError::Conflict(format!(
                "Cannot decline from state={}",
                current.state
            )));
        }

        *guard = None;
        self.events.publish(&NodeEvent::Call(CallEvent::cleared(
            EndReason::Declined,
            Some(call_id.to_string()),
        )));

        info!(target: "kiosk.call", call_id = %call_id, "Call declined");
        Ok(())
    }

    async fn try_end(&self, call_id: &str) -> Result<(), NodeError> {
        validate_call_id(call_id)?;

        let mut guard = self.session.lock().await;
        let current = matching_session(guard.as_mut(), call_id)?;
        let previous_state = current.state;

        *guard = None;
        self.events.publish(&NodeEvent::Call(CallEvent::cleared(
            EndReason::Ended,
            Some(call_id.to_string()),
        )));

        info!(target: "kiosk.call", call_id = %call_id, previous_state = %previous_state, "Call ended");
        Ok(())
    }
}

fn validate_call_id(call_id: &str) -> Result<(), NodeError> {
    if call_id.trim().is_empty() {
        return Err(NodeError::BadRequest("call_id must not be empty".to_string()));
    }
    Ok(())
}

fn matching_session<'a>(
    session: Option<&'a mut CallSession>,
    call_id: &str,
) -> Result<&'a mut CallSession, NodeError> {
    match session {
        Some(current) if current.call_id == call_id => Ok(current),
        _ => Err(NodeError::NotFound("No such call".to_string())),
    }
}

fn record<T>(action: &'static str, result: &Result<T, NodeError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.outcome_label(),
    };
    record_call_transition(action, outcome);
}
