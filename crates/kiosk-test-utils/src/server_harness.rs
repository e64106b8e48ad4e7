//! Test server harnesses for integration tests.
//!
//! `TestKioskNode` and `TestRemoteController` spawn the real routers on
//! random local ports. Nodes use the in-memory sound system and a
//! throwaway picture directory.

use kiosk_node::routes::{self as node_routes, AppState as NodeState};
use kiosk_node::services::volume::mock::InMemoryVolume;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use remote_controller::routes::{self as rc_routes, AppState as RcState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Prometheus handle for test routers.
///
/// The recorder is built but never installed globally, so any number of
/// servers in one test binary can share it.
pub fn test_metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| PrometheusBuilder::new().build_recorder().handle())
        .clone()
}

async fn serve(app: axum::Router) -> Result<(SocketAddr, JoinHandle<()>), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

    let addr = listener
        .local_addr()
        .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("Test server error: {}", e);
        }
    });

    Ok((addr, handle))
}

/// A running kiosk node.
///
/// # Example
/// ```rust,ignore
/// let node = TestKioskNode::spawn().await?;
/// let state: serde_json::Value = reqwest::get(format!("{}/call/state", node.api_url()))
///     .await?
///     .json()
///     .await?;
/// assert_eq!(state["state"], "idle");
/// ```
pub struct TestKioskNode {
    addr: SocketAddr,
    state: Arc<NodeState>,
    volume: Arc<InMemoryVolume>,
    picture_dir: PathBuf,
    _handle: JoinHandle<()>,
}

impl TestKioskNode {
    /// Spawn a node with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&[]).await
    }

    /// Spawn a node, overriding configuration variables
    /// (e.g. `EVENT_QUEUE_CAPACITY`).
    pub async fn spawn_with_vars(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let picture_dir =
            std::env::temp_dir().join(format!("kiosk-test-pics-{}", uuid::Uuid::new_v4()));

        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("VOLUME_BACKEND".to_string(), "memory".to_string()),
            (
                "PICTURE_DIR".to_string(),
                picture_dir.to_string_lossy().to_string(),
            ),
        ]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = kiosk_node::config::Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let picture_dir = config.picture_dir.clone();

        let volume = Arc::new(InMemoryVolume::new(50, false));
        let state = Arc::new(NodeState::new(config, volume.clone()));
        let app = node_routes::build_routes(Arc::clone(&state), test_metrics_handle());

        let (addr, handle) = serve(app).await?;

        Ok(Self {
            addr,
            state,
            volume,
            picture_dir,
            _handle: handle,
        })
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL of the node's API, as a controller is configured with it.
    pub fn api_url(&self) -> String {
        format!("{}/api", self.url())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state, for inspecting the event bus directly.
    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    /// The node's in-memory sound system.
    pub fn volume(&self) -> &InMemoryVolume {
        &self.volume
    }

    pub fn picture_dir(&self) -> &PathBuf {
        &self.picture_dir
    }
}

impl Drop for TestKioskNode {
    fn drop(&mut self) {
        self.state.events.shutdown();
        self._handle.abort();
        let _ = std::fs::remove_dir_all(&self.picture_dir);
    }
}

/// A running remote controller pointed at two nodes.
///
/// Parties are `adam` (first node) and `steve` (second node).
pub struct TestRemoteController {
    addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl TestRemoteController {
    /// Spawn a controller for two test nodes.
    pub async fn spawn(
        adam: &TestKioskNode,
        steve: &TestKioskNode,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with_urls(&adam.api_url(), &steve.api_url(), &[]).await
    }

    /// Spawn a controller for arbitrary node base URLs (e.g. wiremock).
    pub async fn spawn_with_urls(
        adam_api: &str,
        steve_api: &str,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("ADAM_FRAME_API".to_string(), adam_api.to_string()),
            ("STEVE_FRAME_API".to_string(), steve_api.to_string()),
            ("NODE_READ_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("NODE_WRITE_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = remote_controller::config::Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(
            RcState::new(config).map_err(|e| anyhow::anyhow!("Failed to build state: {}", e))?,
        );
        let app = rc_routes::build_routes(state, test_metrics_handle());

        let (addr, handle) = serve(app).await?;

        Ok(Self {
            addr,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of a party-scoped endpoint, e.g. `party_url("adam", "/call/end")`.
    pub fn party_url(&self, party: &str, path: &str) -> String {
        format!("{}/api/{}{}", self.url(), party, path)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestRemoteController {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
