//! HTTP routes for the remote controller.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::errors::RcError;
use crate::handlers;
use crate::handlers::controls::MAX_PICTURE_BYTES;
use crate::middleware::http_metrics_middleware;
use crate::services::{CallOrchestrator, NodeApi, NodeClient};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Drives both parties' nodes.
    pub orchestrator: Arc<CallOrchestrator>,
}

impl AppState {
    /// Build state with HTTP clients for both configured nodes.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if an HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, RcError> {
        let [party_a, party_b] = config.parties();
        let node_a = NodeClient::new(
            party_a,
            config.node_read_timeout,
            config.node_write_timeout,
        )?;
        let node_b = NodeClient::new(
            party_b,
            config.node_read_timeout,
            config.node_write_timeout,
        )?;

        Ok(Self::with_nodes(config, Arc::new(node_a), Arc::new(node_b)))
    }

    /// Build state over arbitrary node implementations.
    pub fn with_nodes(config: Config, node_a: Arc<dyn NodeApi>, node_b: Arc<dyn NodeApi>) -> Self {
        Self {
            config,
            orchestrator: Arc::new(CallOrchestrator::new(node_a, node_b)),
        }
    }
}

/// Build the application routes.
///
/// - `/api/{party}/call/*` - orchestrated call actions
/// - `/api/{party}/status` - both nodes' volume and call state
/// - `/api/{party}/volume/{action}`, `/reaction`, `/picture` - controls for the other party
/// - `/api/health`, `/health`, `/metrics` - operational endpoints
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = state.config.request_timeout();

    let api_routes = Router::new()
        .route("/health", get(handlers::api_health))
        .route("/:party/status", get(handlers::get_status))
        .route("/:party/call/initiate", post(handlers::initiate_call))
        .route("/:party/call/accept", post(handlers::accept_call))
        .route("/:party/call/decline", post(handlers::decline_call))
        .route("/:party/call/end", post(handlers::end_call))
        .route("/:party/call/reset", post(handlers::reset_call))
        .route("/:party/volume/:action", post(handlers::change_volume))
        .route("/:party/reaction", post(handlers::send_reaction))
        .route(
            "/:party/picture",
            post(handlers::send_picture).layer(DefaultBodyLimit::max(MAX_PICTURE_BYTES)),
        )
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - outlasts the slowest leg chain so legs always report
    // 2. TraceLayer - log request details
    // 3. http_metrics_middleware - record ALL responses (outermost)
    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health_check))
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::node_client::mock::MockNode;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::types::CallState;
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config() -> Config {
        test_config_with(&[])
    }

    fn test_config_with(overrides: &[(&str, &str)]) -> Config {
        let mut vars = HashMap::from([
            (
                "ADAM_FRAME_API".to_string(),
                "http://adam.invalid/api".to_string(),
            ),
            (
                "STEVE_FRAME_API".to_string(),
                "http://steve.invalid/api".to_string(),
            ),
            ("STEVE_ACCESS_CLIENT_ID".to_string(), "id".to_string()),
            ("STEVE_ACCESS_CLIENT_SECRET".to_string(), "secret".to_string()),
        ]);
        for (key, value) in overrides {
            vars.insert(key.to_string(), value.to_string());
        }
        Config::from_vars(&vars).unwrap()
    }

    fn test_router(adam: MockNode, steve: MockNode) -> (Router, Arc<MockNode>, Arc<MockNode>) {
        test_router_with(test_config(), adam, steve)
    }

    fn test_router_with(
        config: Config,
        adam: MockNode,
        steve: MockNode,
    ) -> (Router, Arc<MockNode>, Arc<MockNode>) {
        let adam = Arc::new(adam);
        let steve = Arc::new(steve);
        let state = Arc::new(AppState::with_nodes(
            config,
            Arc::clone(&adam) as Arc<dyn NodeApi>,
            Arc::clone(&steve) as Arc<dyn NodeApi>,
        ));
        let handle = PrometheusBuilder::new().build_recorder().handle();
        (build_routes(state, handle), adam, steve)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_app_state_new_builds_clients() {
        let state = AppState::new(test_config()).unwrap();
        assert_eq!(state.orchestrator.parties(), ["adam", "steve"]);
    }

    #[tokio::test]
    async fn test_initiate_route() {
        let (router, _adam, steve) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(post("/api/adam/call/initiate"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["self"]["call"]["state"], "outgoing_ringing");
        assert_eq!(body["other"]["call"]["state"], "incoming_ringing");
        assert_eq!(
            steve.session().unwrap().call_id,
            body["call_id"].as_str().unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_end_leg_within_node_timeouts_completes() {
        let config = test_config_with(&[("NODE_WRITE_TIMEOUT_SECONDS", "60")]);
        let adam = MockNode::with_session("adam", "c1", CallState::Connecting);
        let steve = MockNode::with_session("steve", "c1", CallState::Connecting);
        steve.delay("end", Duration::from_secs(35));
        let (router, adam, steve) = test_router_with(config, adam, steve);

        let response = router.oneshot(post("/api/adam/call/end")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["self"]["ok"], true);
        assert_eq!(body["other"]["ok"], true);
        assert!(adam.session().is_none());
        assert!(steve.session().is_none());
    }

    #[tokio::test]
    async fn test_unknown_party_is_not_found() {
        let (router, adam, steve) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(post("/api/eve/call/initiate"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(adam.call_count() + steve.call_count(), 0);
    }

    #[tokio::test]
    async fn test_accept_without_call_is_conflict() {
        let (router, _, _) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(post("/api/steve/call/accept"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_status_route() {
        let adam = MockNode::with_session("adam", "c1", CallState::OutgoingRinging);
        let (router, _, _) = test_router(adam, MockNode::new("steve"));

        let response = router
            .oneshot(Request::get("/api/adam/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["self"]["call_state"], "outgoing_ringing");
        assert_eq!(body["self"]["volume"]["volume_percent"], 50);
        assert_eq!(body["other"]["call_state"], "idle");
        assert!(body["other"]["call"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_volume_action_is_not_found() {
        let (router, _, steve) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(post("/api/adam/volume/louder"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(steve.call_count(), 0);
    }

    #[tokio::test]
    async fn test_volume_acts_on_other_party() {
        let (router, adam, steve) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(post("/api/adam/volume/mute"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["muted"], true);
        assert_eq!(steve.call_count(), 1);
        assert_eq!(adam.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reaction_requires_json_message() {
        let (router, _, _) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(
                Request::post("/api/adam/reaction")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_health_lists_frames() {
        let (router, _, _) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["frames"]["adam"], "http://adam.invalid/api");
        assert_eq!(body["access_tokens_configured"]["adam"], false);
        assert_eq!(body["access_tokens_configured"]["steve"], true);
    }

    #[tokio::test]
    async fn test_liveness() {
        let (router, _, _) = test_router(MockNode::new("adam"), MockNode::new("steve"));

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }
}
