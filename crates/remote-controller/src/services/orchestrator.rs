//! Call orchestration across the two parties' nodes.
//!
//! Each operation is requested by one party ("self") and may act on the
//! other party's node too. Legs run in the order the call protocol needs:
//!
//! 1. `initiate`: self `initiate` with a fresh call id, then other `receive`
//! 2. `accept`: self state lookup, then self `accept`
//! 3. `decline`: self state lookup, self `decline`, then other `end`
//! 4. `end`: call id from self or other, then `end` on both
//! 5. `reset`: `reset` on both
//!
//! A failed leg that the operation depends on aborts with
//! `RcError::Upstream`. Every other leg failure is reported inline. There
//! is no rollback: a caller left ringing after a failed `receive` is
//! cleared by a later `end` or `reset`.

use crate::errors::RcError;
use crate::models::{
    InlineError, LegOutcome, OrchestrationResponse, PartyStatus, ReadOutcome, StatusResponse,
};
use crate::observability::metrics;
use crate::services::node_client::{CallAction, NodeApi, PictureUpload, PictureStored, VolumeAction};
use common::types::{CallStateResponse, VolumeStatus};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Note attached when clearing the other party's node fails during decline.
pub const DECLINE_OTHER_NOTE: &str = "other frame end failed (may be idle)";

/// Note attached when ending the call on either node fails.
pub const END_LEG_NOTE: &str = "frame end failed (may already be idle)";

/// Stateless coordinator for the two configured nodes.
pub struct CallOrchestrator {
    nodes: [Arc<dyn NodeApi>; 2],
}

impl CallOrchestrator {
    pub fn new(party_a: Arc<dyn NodeApi>, party_b: Arc<dyn NodeApi>) -> Self {
        Self {
            nodes: [party_a, party_b],
        }
    }

    /// Party names in configuration order.
    pub fn parties(&self) -> [&str; 2] {
        let [a, b] = &self.nodes;
        [a.party(), b.party()]
    }

    /// Resolve `(self, other)` for the requesting party.
    ///
    /// # Errors
    ///
    /// `RcError::NotFound` if `party` is not one of the configured parties.
    pub fn pair(&self, party: &str) -> Result<(&dyn NodeApi, &dyn NodeApi), RcError> {
        let [a, b] = &self.nodes;
        if a.party() == party {
            Ok((a.as_ref(), b.as_ref()))
        } else if b.party() == party {
            Ok((b.as_ref(), a.as_ref()))
        } else {
            Err(RcError::NotFound(format!("Unknown party '{}'", party)))
        }
    }

    /// Start a call from `party` to the other party.
    #[instrument(skip(self))]
    pub async fn initiate(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let result = self.initiate_legs(party).await;
        finish("initiate", result)
    }

    async fn initiate_legs(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let (me, them) = self.pair(party)?;
        let call_id = Uuid::new_v4().to_string();

        let self_response = me.call_action(CallAction::Initiate, &call_id).await?;

        let other_leg = match them.call_action(CallAction::Receive, &call_id).await {
            Ok(response) => LegOutcome::completed(response),
            Err(e) => {
                warn!(
                    target: "rc.services.orchestrator",
                    call_id = %call_id,
                    caller = %me.party(),
                    callee = %them.party(),
                    error = %e,
                    "Callee did not receive the call; caller left ringing"
                );
                LegOutcome::failed(&e)
            }
        };

        info!(
            target: "rc.services.orchestrator",
            call_id = %call_id,
            caller = %me.party(),
            callee = %them.party(),
            delivered = other_leg.ok,
            "Call initiated"
        );

        Ok(OrchestrationResponse {
            ok: other_leg.ok,
            call_id: Some(call_id),
            self_leg: LegOutcome::completed(self_response),
            other_leg: Some(other_leg),
        })
    }

    /// Accept the call ringing on `party`'s node.
    #[instrument(skip(self))]
    pub async fn accept(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let result = self.accept_legs(party).await;
        finish("accept", result)
    }

    async fn accept_legs(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let (me, _) = self.pair(party)?;
        let call_id = active_call_id(me).await?;

        let response = me.call_action(CallAction::Accept, &call_id).await?;

        info!(target: "rc.services.orchestrator", call_id = %call_id, party = %me.party(), "Call accepted");

        Ok(OrchestrationResponse {
            ok: true,
            call_id: Some(call_id),
            self_leg: LegOutcome::completed(response),
            other_leg: None,
        })
    }

    /// Decline the call ringing on `party`'s node and clear the caller.
    #[instrument(skip(self))]
    pub async fn decline(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let result = self.decline_legs(party).await;
        finish("decline", result)
    }

    async fn decline_legs(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let (me, them) = self.pair(party)?;
        let call_id = active_call_id(me).await?;

        let self_response = me.call_action(CallAction::Decline, &call_id).await?;

        let other_leg = match them.call_action(CallAction::End, &call_id).await {
            Ok(response) => LegOutcome::completed(response),
            Err(e) => {
                debug!(
                    target: "rc.services.orchestrator",
                    call_id = %call_id,
                    party = %them.party(),
                    error = %e,
                    "Caller could not be cleared after decline"
                );
                LegOutcome::failed(&e).with_note(DECLINE_OTHER_NOTE)
            }
        };

        info!(target: "rc.services.orchestrator", call_id = %call_id, party = %me.party(), "Call declined");

        Ok(OrchestrationResponse {
            ok: true,
            call_id: Some(call_id),
            self_leg: LegOutcome::completed(self_response),
            other_leg: Some(other_leg),
        })
    }

    /// End the current call on both nodes.
    ///
    /// The call id comes from `party`'s node, or from the other node when
    /// `party` is already idle. If neither node reports a call and either
    /// could not be asked, the failed lookup's upstream error is returned.
    #[instrument(skip(self))]
    pub async fn end(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let result = self.end_legs(party).await;
        finish("end", result)
    }

    async fn end_legs(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let (me, them) = self.pair(party)?;
        let call_id = either_call_id(me, them).await?;

        let (self_result, other_result) = tokio::join!(
            me.call_action(CallAction::End, &call_id),
            them.call_action(CallAction::End, &call_id)
        );

        let self_leg = end_leg(self_result, me.party(), &call_id);
        let other_leg = end_leg(other_result, them.party(), &call_id);

        info!(
            target: "rc.services.orchestrator",
            call_id = %call_id,
            party = %me.party(),
            self_ok = self_leg.ok,
            other_ok = other_leg.ok,
            "Call ended"
        );

        Ok(OrchestrationResponse {
            ok: true,
            call_id: Some(call_id),
            self_leg,
            other_leg: Some(other_leg),
        })
    }

    /// Clear both nodes unconditionally.
    #[instrument(skip(self))]
    pub async fn reset(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let result = self.reset_legs(party).await;
        finish("reset", result)
    }

    async fn reset_legs(&self, party: &str) -> Result<OrchestrationResponse, RcError> {
        let (me, them) = self.pair(party)?;

        let (self_result, other_result) = tokio::join!(me.reset(), them.reset());
        let leg = |result: Result<_, RcError>| match result {
            Ok(response) => LegOutcome::completed(response),
            Err(e) => {
                warn!(target: "rc.services.orchestrator", error = %e, "Reset failed");
                LegOutcome::failed(&e)
            }
        };

        Ok(OrchestrationResponse {
            ok: true,
            call_id: None,
            self_leg: leg(self_result),
            other_leg: Some(leg(other_result)),
        })
    }

    /// Volume and call state of both nodes, read concurrently.
    #[instrument(skip(self))]
    pub async fn status(&self, party: &str) -> Result<StatusResponse, RcError> {
        let (me, them) = match self.pair(party) {
            Ok(pair) => pair,
            Err(e) => return finish("status", Err(e)),
        };

        let (self_volume, other_volume, self_call, other_call) = tokio::join!(
            me.volume(),
            them.volume(),
            me.call_state(),
            them.call_state()
        );

        let response = StatusResponse {
            self_status: party_status(self_volume, self_call, "self"),
            other: party_status(other_volume, other_call, "other"),
        };
        metrics::record_orchestration("status", "success");
        Ok(response)
    }

    /// Apply a volume action to the other party's node.
    #[instrument(skip(self))]
    pub async fn volume(&self, party: &str, action: VolumeAction) -> Result<VolumeStatus, RcError> {
        let (_, them) = self.pair(party)?;
        them.volume_action(action).await
    }

    /// Show a reaction on the other party's node.
    ///
    /// # Errors
    ///
    /// `RcError::BadRequest` when the message is blank.
    #[instrument(skip(self, message))]
    pub async fn reaction(&self, party: &str, message: &str) -> Result<(), RcError> {
        let (_, them) = self.pair(party)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(RcError::BadRequest("message required".to_string()));
        }
        them.reaction(message).await
    }

    /// Send a picture to the other party's node.
    #[instrument(skip(self, upload))]
    pub async fn picture(
        &self,
        party: &str,
        upload: PictureUpload,
    ) -> Result<PictureStored, RcError> {
        let (_, them) = self.pair(party)?;
        them.picture(upload).await
    }
}

/// Record the operation outcome and pass the result through.
fn finish<T: Outcome>(operation: &'static str, result: Result<T, RcError>) -> Result<T, RcError> {
    let outcome = match &result {
        Ok(value) if value.is_partial() => "partial",
        Ok(_) => "success",
        Err(e) => e.outcome_label(),
    };
    metrics::record_orchestration(operation, outcome);
    result
}

trait Outcome {
    fn is_partial(&self) -> bool;
}

impl Outcome for OrchestrationResponse {
    fn is_partial(&self) -> bool {
        OrchestrationResponse::is_partial(self)
    }
}

impl Outcome for StatusResponse {
    fn is_partial(&self) -> bool {
        false
    }
}

/// Call id of the session on `node`.
///
/// # Errors
///
/// `RcError::Conflict` when the node has no session; the lookup's own
/// error when the node cannot be read.
async fn active_call_id(node: &dyn NodeApi) -> Result<String, RcError> {
    let state = node.call_state().await?;
    state
        .call_id()
        .map(str::to_string)
        .ok_or_else(|| RcError::Conflict(format!("No active call on {}", node.party())))
}

/// Call id from `me`, falling back to `them`.
async fn either_call_id(me: &dyn NodeApi, them: &dyn NodeApi) -> Result<String, RcError> {
    let own = me.call_state().await;
    if let Some(call_id) = own.as_ref().ok().and_then(CallStateResponse::call_id) {
        return Ok(call_id.to_string());
    }

    let theirs = them.call_state().await;
    if let Some(call_id) = theirs.as_ref().ok().and_then(CallStateResponse::call_id) {
        debug!(
            target: "rc.services.orchestrator",
            call_id = %call_id,
            party = %them.party(),
            "Using the other party's call id"
        );
        return Ok(call_id.to_string());
    }

    // An unreachable node may still hold the call.
    match (own, theirs) {
        (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        (Ok(_), Ok(_)) => Err(RcError::Conflict(
            "No active call on either frame".to_string(),
        )),
    }
}

fn end_leg(
    result: Result<common::types::CallActionResponse, RcError>,
    party: &str,
    call_id: &str,
) -> LegOutcome {
    match result {
        Ok(response) => LegOutcome::completed(response),
        Err(e) => {
            debug!(
                target: "rc.services.orchestrator",
                call_id = %call_id,
                party = %party,
                error = %e,
                "End leg failed"
            );
            LegOutcome::failed(&e).with_note(END_LEG_NOTE)
        }
    }
}

fn party_status(
    volume: Result<VolumeStatus, RcError>,
    call: Result<CallStateResponse, RcError>,
    side: &str,
) -> PartyStatus {
    let volume = match volume {
        Ok(status) => ReadOutcome::Value(status),
        Err(e) => ReadOutcome::Failed(InlineError::new(&format!("{} volume", side), &e)),
    };

    match call {
        Ok(state) => PartyStatus {
            volume,
            call_state: Some(state.state),
            call: state.call,
            call_error: None,
        },
        Err(e) => PartyStatus {
            volume,
            call_state: None,
            call: None,
            call_error: Some(InlineError::new(&format!("{} call", side), &e)),
        },
    }
}
