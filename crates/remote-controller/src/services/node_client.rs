//! HTTP client for a party's kiosk node.
//!
//! Every remote leg the orchestrator performs goes through [`NodeApi`].
//! [`NodeClient`] is the reqwest implementation; the `mock` module provides
//! an in-memory double for unit tests.
//!
//! # Failure mapping
//!
//! - Connection errors and timeouts become `RcError::Upstream` without a status
//! - Non-2xx responses become `RcError::Upstream` carrying the node's status and
//!   error message (truncated)
//! - Undecodable success bodies become `RcError::Upstream` as well, since the
//!   node answered but not with its contract

use crate::config::{AccessCredentials, PartyConfig};
use crate::errors::RcError;
use crate::observability::metrics;
use async_trait::async_trait;
use common::secret::ExposeSecret;
use common::types::{
    CallActionRequest, CallActionResponse, CallStateResponse, ReactionRequest, VolumeStatus,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Connect timeout shared by every node request.
const NODE_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Header names understood by the access proxy in front of a node.
pub const ACCESS_CLIENT_ID_HEADER: &str = "CF-Access-Client-Id";
pub const ACCESS_CLIENT_SECRET_HEADER: &str = "CF-Access-Client-Secret";

/// Call actions that name a session on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    Initiate,
    Receive,
    Accept,
    Decline,
    End,
}

impl CallAction {
    /// Path of the action below the node API base.
    pub fn path(&self) -> &'static str {
        match self {
            CallAction::Initiate => "/call/initiate",
            CallAction::Receive => "/call/receive",
            CallAction::Accept => "/call/accept",
            CallAction::Decline => "/call/decline",
            CallAction::End => "/call/end",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallAction::Initiate => "initiate",
            CallAction::Receive => "receive",
            CallAction::Accept => "accept",
            CallAction::Decline => "decline",
            CallAction::End => "end",
        }
    }
}

/// Volume actions forwarded to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeAction {
    Raise,
    Lower,
    Mute,
}

impl VolumeAction {
    pub fn path(&self) -> &'static str {
        match self {
            VolumeAction::Raise => "/volume/raise",
            VolumeAction::Lower => "/volume/lower",
            VolumeAction::Mute => "/volume/mute",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeAction::Raise => "raise",
            VolumeAction::Lower => "lower",
            VolumeAction::Mute => "mute",
        }
    }
}

impl FromStr for VolumeAction {
    type Err = RcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raise" => Ok(VolumeAction::Raise),
            "lower" => Ok(VolumeAction::Lower),
            "mute" => Ok(VolumeAction::Mute),
            other => Err(RcError::NotFound(format!(
                "Unknown volume action '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for VolumeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A picture received from a remote and forwarded to a node.
#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Node answer to `POST /picture`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct PictureStored {
    pub ok: bool,
    pub url: String,
}

/// Operations the orchestrator performs against one node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Party name the node belongs to.
    fn party(&self) -> &str;

    /// `GET /call/state`
    async fn call_state(&self) -> Result<CallStateResponse, RcError>;

    /// `POST /call/{action}` with the given call id.
    async fn call_action(
        &self,
        action: CallAction,
        call_id: &str,
    ) -> Result<CallActionResponse, RcError>;

    /// `POST /call/reset`
    async fn reset(&self) -> Result<CallActionResponse, RcError>;

    /// `GET /volume`
    async fn volume(&self) -> Result<VolumeStatus, RcError>;

    /// `POST /volume/{action}`
    async fn volume_action(&self, action: VolumeAction) -> Result<VolumeStatus, RcError>;

    /// `POST /reaction`
    async fn reaction(&self, message: &str) -> Result<(), RcError>;

    /// `POST /picture` as multipart field `file`.
    async fn picture(&self, upload: PictureUpload) -> Result<PictureStored, RcError>;
}

#[derive(Deserialize)]
struct NodeErrorBody {
    error: NodeErrorDetail,
}

#[derive(Deserialize)]
struct NodeErrorDetail {
    message: String,
}

/// Pulls the message out of a node error body, falling back to the raw text.
fn error_text(body: &str) -> String {
    match serde_json::from_str::<NodeErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.trim().to_string(),
    }
}

/// reqwest-backed [`NodeApi`] for one party.
#[derive(Clone)]
pub struct NodeClient {
    client: Client,

    party: String,

    /// Node API base, e.g. `https://frame.example.com/api`.
    base_url: String,

    access: Option<AccessCredentials>,

    read_timeout: Duration,

    write_timeout: Duration,
}

impl NodeClient {
    /// Create a client for one party's node.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if the HTTP client cannot be built.
    pub fn new(
        party: &PartyConfig,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, RcError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(NODE_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "rc.services.node_client", error = %e, "Failed to build HTTP client");
                RcError::Internal
            })?;

        Ok(Self {
            client,
            party: party.name.clone(),
            base_url: party.frame_api.clone(),
            access: party.access.clone(),
            read_timeout,
            write_timeout,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let timeout = if method == Method::GET {
            self.read_timeout
        } else {
            self.write_timeout
        };

        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(timeout);

        if let Some(access) = &self.access {
            builder = builder
                .header(ACCESS_CLIENT_ID_HEADER, access.client_id.as_str())
                .header(
                    ACCESS_CLIENT_SECRET_HEADER,
                    access.client_secret.expose_secret(),
                );
        }

        builder
    }

    /// Send a request and decode a JSON success body.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, RcError> {
        let operation = format!("{} {}", method, path);
        let start = Instant::now();
        let result = self.send_inner(&operation, builder).await;

        let status = match &result {
            Ok(_) => "success",
            Err(RcError::Upstream { status: None, .. }) => "unreachable",
            Err(_) => "error",
        };
        metrics::record_node_request(&self.party, path, status, start.elapsed());

        result
    }

    async fn send_inner<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<T, RcError> {
        let response = builder.send().await.map_err(|e| {
            warn!(
                target: "rc.services.node_client",
                party = %self.party,
                operation = %operation,
                timeout = e.is_timeout(),
                error = %e,
                "Node request failed"
            );
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            RcError::upstream(&self.party, operation, None, &message)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                target: "rc.services.node_client",
                party = %self.party,
                operation = %operation,
                status = %status,
                "Node rejected request"
            );
            return Err(RcError::upstream(
                &self.party,
                operation,
                Some(status.as_u16()),
                &error_text(&body),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            warn!(
                target: "rc.services.node_client",
                party = %self.party,
                operation = %operation,
                error = %e,
                "Failed to decode node response"
            );
            RcError::upstream(
                &self.party,
                operation,
                None,
                &format!("invalid response body: {}", e),
            )
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RcError> {
        let builder = self.request(Method::GET, path);
        self.send(Method::GET, path, builder).await
    }

    async fn post_json<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RcError> {
        let builder = self.request(Method::POST, path).json(body);
        self.send(Method::POST, path, builder).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, RcError> {
        let builder = self.request(Method::POST, path);
        self.send(Method::POST, path, builder).await
    }
}

#[derive(Deserialize)]
struct VolumeBody {
    volume_percent: u8,
    muted: bool,
}

impl From<VolumeBody> for VolumeStatus {
    fn from(body: VolumeBody) -> Self {
        VolumeStatus {
            volume_percent: body.volume_percent,
            muted: body.muted,
        }
    }
}

#[derive(Deserialize)]
struct OkBody {
    #[allow(dead_code)]
    ok: bool,
}

#[async_trait]
impl NodeApi for NodeClient {
    fn party(&self) -> &str {
        &self.party
    }

    #[instrument(skip(self), fields(party = %self.party))]
    async fn call_state(&self) -> Result<CallStateResponse, RcError> {
        self.get_json("/call/state").await
    }

    #[instrument(skip(self), fields(party = %self.party, action = action.as_str()))]
    async fn call_action(
        &self,
        action: CallAction,
        call_id: &str,
    ) -> Result<CallActionResponse, RcError> {
        let body = CallActionRequest {
            call_id: call_id.to_string(),
        };
        self.post_json(action.path(), &body).await
    }

    #[instrument(skip(self), fields(party = %self.party))]
    async fn reset(&self) -> Result<CallActionResponse, RcError> {
        self.post_empty("/call/reset").await
    }

    #[instrument(skip(self), fields(party = %self.party))]
    async fn volume(&self) -> Result<VolumeStatus, RcError> {
        self.get_json::<VolumeBody>("/volume").await.map(Into::into)
    }

    #[instrument(skip(self), fields(party = %self.party, action = action.as_str()))]
    async fn volume_action(&self, action: VolumeAction) -> Result<VolumeStatus, RcError> {
        self.post_empty::<VolumeBody>(action.path())
            .await
            .map(Into::into)
    }

    #[instrument(skip(self, message), fields(party = %self.party))]
    async fn reaction(&self, message: &str) -> Result<(), RcError> {
        let body = ReactionRequest {
            message: message.to_string(),
        };
        self.post_json::<OkBody, _>("/reaction", &body).await?;
        Ok(())
    }

    #[instrument(skip(self, upload), fields(party = %self.party, bytes = upload.bytes.len()))]
    async fn picture(&self, upload: PictureUpload) -> Result<PictureStored, RcError> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|_| {
                RcError::BadRequest(format!(
                    "Invalid picture content type '{}'",
                    upload.content_type
                ))
            })?;

        let builder = self
            .request(Method::POST, "/picture")
            .multipart(Form::new().part("file", part));
        self.send(Method::POST, "/picture", builder).await
    }
}

/// In-memory node double for unit tests.
pub mod mock {
    use super::*;
    use chrono::Utc;
    use common::types::{CallSessionView, CallState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock node that follows the node state machine loosely and can be
    /// told to fail individual operations.
    pub struct MockNode {
        party: String,
        session: Mutex<Option<CallSessionView>>,
        volume: Mutex<VolumeStatus>,
        /// Operations (`"state"`, `"initiate"`, `"reset"`, ...) that fail.
        failing: Mutex<Vec<&'static str>>,
        /// Operations that take this long before answering.
        delays: Mutex<Vec<(&'static str, Duration)>>,
        /// Every operation performed, in order, with its call id if any.
        calls: Mutex<Vec<(String, Option<String>)>>,
        call_count: AtomicUsize,
    }

    impl MockNode {
        pub fn new(party: &str) -> Self {
            Self {
                party: party.to_string(),
                session: Mutex::new(None),
                volume: Mutex::new(VolumeStatus {
                    volume_percent: 50,
                    muted: false,
                }),
                failing: Mutex::new(Vec::new()),
                delays: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Start with an active session.
        pub fn with_session(party: &str, call_id: &str, state: CallState) -> Self {
            let node = Self::new(party);
            node.set_session(Some(CallSessionView {
                call_id: call_id.to_string(),
                state,
                created_at: Utc::now(),
            }));
            node
        }

        /// Make an operation fail with an upstream error.
        pub fn fail(&self, operation: &'static str) {
            lock(&self.failing).push(operation);
        }

        /// Make an operation answer only after `delay`.
        pub fn delay(&self, operation: &'static str, delay: Duration) {
            lock(&self.delays).push((operation, delay));
        }

        pub fn set_session(&self, session: Option<CallSessionView>) {
            *lock(&self.session) = session;
        }

        pub fn session(&self) -> Option<CallSessionView> {
            lock(&self.session).clone()
        }

        /// Operations performed so far.
        pub fn calls(&self) -> Vec<(String, Option<String>)> {
            lock(&self.calls).clone()
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        async fn record(
            &self,
            operation: &'static str,
            call_id: Option<&str>,
        ) -> Result<(), RcError> {
            let delay = lock(&self.delays)
                .iter()
                .find(|(op, _)| *op == operation)
                .map(|(_, delay)| *delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.call_count.fetch_add(1, Ordering::SeqCst);
            lock(&self.calls).push((operation.to_string(), call_id.map(str::to_string)));

            if lock(&self.failing).contains(&operation) {
                return Err(RcError::upstream(
                    &self.party,
                    operation,
                    Some(500),
                    "Mock node failure",
                ));
            }
            Ok(())
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[async_trait]
    impl NodeApi for MockNode {
        fn party(&self) -> &str {
            &self.party
        }

        async fn call_state(&self) -> Result<CallStateResponse, RcError> {
            self.record("state", None).await?;
            Ok(CallStateResponse::from(self.session()))
        }

        async fn call_action(
            &self,
            action: CallAction,
            call_id: &str,
        ) -> Result<CallActionResponse, RcError> {
            self.record(action.as_str(), Some(call_id)).await?;

            let mut session = lock(&self.session);
            let matches = session.as_ref().map(|s| s.call_id.as_str()) == Some(call_id);
            match action {
                CallAction::Initiate | CallAction::Receive => {
                    if session.as_ref().is_some_and(|s| !s.state.is_available()) {
                        return Err(RcError::upstream(
                            &self.party,
                            action.path(),
                            Some(409),
                            "Busy",
                        ));
                    }
                    let state = if action == CallAction::Initiate {
                        CallState::OutgoingRinging
                    } else {
                        CallState::IncomingRinging
                    };
                    let view = CallSessionView {
                        call_id: call_id.to_string(),
                        state,
                        created_at: Utc::now(),
                    };
                    *session = Some(view.clone());
                    Ok(CallActionResponse {
                        ok: true,
                        call: Some(view),
                    })
                }
                CallAction::Accept => match session.as_mut() {
                    Some(view) if matches => {
                        view.state = CallState::Connecting;
                        Ok(CallActionResponse {
                            ok: true,
                            call: Some(view.clone()),
                        })
                    }
                    _ => Err(RcError::upstream(
                        &self.party,
                        action.path(),
                        Some(404),
                        "No such call",
                    )),
                },
                CallAction::Decline | CallAction::End => {
                    if !matches {
                        return Err(RcError::upstream(
                            &self.party,
                            action.path(),
                            Some(404),
                            "No such call",
                        ));
                    }
                    *session = None;
                    Ok(CallActionResponse {
                        ok: true,
                        call: None,
                    })
                }
            }
        }

        async fn reset(&self) -> Result<CallActionResponse, RcError> {
            self.record("reset", None).await?;
            self.set_session(None);
            Ok(CallActionResponse {
                ok: true,
                call: None,
            })
        }

        async fn volume(&self) -> Result<VolumeStatus, RcError> {
            self.record("volume", None).await?;
            Ok(*lock(&self.volume))
        }

        async fn volume_action(&self, action: VolumeAction) -> Result<VolumeStatus, RcError> {
            self.record(action.as_str(), None).await?;
            let mut volume = lock(&self.volume);
            match action {
                VolumeAction::Raise => {
                    volume.volume_percent = volume.volume_percent.saturating_add(5).min(100)
                }
                VolumeAction::Lower => {
                    volume.volume_percent = volume.volume_percent.saturating_sub(5)
                }
                VolumeAction::Mute => volume.muted = !volume.muted,
            }
            Ok(*volume)
        }

        async fn reaction(&self, message: &str) -> Result<(), RcError> {
            self.record("reaction", Some(message)).await
        }

        async fn picture(&self, _upload: PictureUpload) -> Result<PictureStored, RcError> {
            self.record("picture", None).await?;
            Ok(PictureStored {
                ok: true,
                url: "/pics/current.jpg".to_string(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_action_from_str() {
        assert_eq!("raise".parse::<VolumeAction>().unwrap(), VolumeAction::Raise);
        assert_eq!("lower".parse::<VolumeAction>().unwrap(), VolumeAction::Lower);
        assert_eq!("mute".parse::<VolumeAction>().unwrap(), VolumeAction::Mute);

        let err = "louder".parse::<VolumeAction>().unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_call_action_paths() {
        assert_eq!(CallAction::Initiate.path(), "/call/initiate");
        assert_eq!(CallAction::Receive.path(), "/call/receive");
        assert_eq!(CallAction::End.path(), "/call/end");
    }

    #[test]
    fn test_error_text_prefers_node_message() {
        let body = r#"{"error":{"code":"CONFLICT","message":"Busy: call c1 is outgoing_ringing"}}"#;
        assert_eq!(error_text(body), "Busy: call c1 is outgoing_ringing");
        assert_eq!(error_text("  Bad Gateway \n"), "Bad Gateway");
    }
}
