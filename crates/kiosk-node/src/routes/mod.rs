//! HTTP routes for the kiosk node.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::pictures::MAX_PICTURE_BYTES;
use crate::services::{CallStateMachine, EventBus, PictureStore, VolumeControl, VolumeService};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Live event fan-out behind `/api/events`.
    pub events: Arc<EventBus>,

    /// The node's single call session.
    pub calls: Arc<CallStateMachine>,

    /// Volume actions over the configured sound system.
    pub volume: VolumeService,

    /// Where uploaded pictures are written.
    pub pictures: PictureStore,
}

impl AppState {
    /// Wire the node's services together from configuration.
    pub fn new(config: Config, volume_control: Arc<dyn VolumeControl>) -> Self {
        let events = Arc::new(EventBus::new(
            config.event_queue_capacity,
            config.event_keepalive,
        ));
        let calls = Arc::new(CallStateMachine::new(Arc::clone(&events)));
        let volume = VolumeService::new(volume_control, config.volume_step);
        let pictures = PictureStore::new(config.picture_dir.clone());

        Self {
            config,
            events,
            calls,
            volume,
            pictures,
        }
    }
}

/// Build the application routes.
///
/// - `/api/call/*` - call state machine
/// - `/api/events` - server-sent event stream
/// - `/api/volume*`, `/api/reaction`, `/api/picture` - frame controls
/// - `/pics/*` - the uploaded picture
/// - `/health`, `/metrics` - operational endpoints
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/call/state", get(handlers::get_call_state))
        .route("/call/initiate", post(handlers::initiate_call))
        .route("/call/receive", post(handlers::receive_call))
        .route("/call/accept", post(handlers::accept_call))
        .route("/call/decline", post(handlers::decline_call))
        .route("/call/end", post(handlers::end_call))
        .route("/call/reset", post(handlers::reset_call))
        .route("/events", get(handlers::event_stream))
        .route("/volume", get(handlers::get_volume))
        .route("/volume/raise", post(handlers::raise_volume))
        .route("/volume/lower", post(handlers::lower_volume))
        .route("/volume/mute", post(handlers::toggle_mute))
        .route("/reaction", post(handlers::post_reaction))
        .route(
            "/picture",
            post(handlers::upload_picture).layer(DefaultBodyLimit::max(MAX_PICTURE_BYTES)),
        )
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - bounds time to response headers; open SSE bodies are unaffected
    // 2. TraceLayer - log request details
    // 3. http_metrics_middleware - record ALL responses (outermost)
    Router::new()
        .nest("/api", api_routes)
        .nest_service("/pics", ServeDir::new(state.pictures.dir()))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::volume::mock::InMemoryVolume;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_router() -> (Router, Arc<AppState>) {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        let state = Arc::new(AppState::new(config, Arc::new(InMemoryVolume::default())));
        let handle = PrometheusBuilder::new().build_recorder().handle();
        (build_routes(Arc::clone(&state), handle), state)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_initiate_returns_accepted() {
        let (router, state) = test_router();

        let response = router
            .oneshot(
                Request::post("/api/call/initiate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"call_id":"c1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["call"]["call_id"], "c1");
        assert_eq!(state.calls.snapshot().await.call_id(), Some("c1"));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let (router, _state) = test_router();

        let response = router
            .oneshot(
                Request::post("/api/call/receive")
                    .body(Body::from(r#"{"call_id":"c1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_call_routes_are_nested_under_api() {
        let (router, _state) = test_router();

        let response = router
            .oneshot(Request::get("/call/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_endpoint_is_event_stream() {
        let (router, state) = test_router();

        let response = router
            .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(state.events.subscriber_count(), 1);

        drop(response);
        assert_eq!(state.events.subscriber_count(), 0);
    }
}
