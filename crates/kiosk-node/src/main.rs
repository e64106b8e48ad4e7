//! Kiosk node
//!
//! Serves one frame's call signaling, event stream and controls.

use kiosk_node::config::{Config, VolumeBackend};
use kiosk_node::observability::metrics::init_metrics_recorder;
use kiosk_node::routes::{self, AppState};
use kiosk_node::services::volume::mock::InMemoryVolume;
use kiosk_node::services::{EventBus, PactlVolume, VolumeControl};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiosk_node=debug,kiosk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kiosk node");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        volume_backend = ?config.volume_backend,
        sound_sink = %config.sound_sink,
        picture_dir = %config.picture_dir.display(),
        event_queue_capacity = config.event_queue_capacity,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    tokio::fs::create_dir_all(&config.picture_dir)
        .await
        .map_err(|e| {
            error!(
                "Failed to create picture directory {}: {}",
                config.picture_dir.display(),
                e
            );
            e
        })?;

    let volume: Arc<dyn VolumeControl> = match config.volume_backend {
        VolumeBackend::Pactl => Arc::new(PactlVolume::new(
            config.sound_sink.clone(),
            config.volume_command_timeout,
        )),
        VolumeBackend::Memory => {
            warn!("Using in-memory volume backend; the sound system is not touched");
            Arc::new(InMemoryVolume::default())
        }
    };

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(config, volume));
    let events = Arc::clone(&state.events);

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Kiosk node listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(events))
        .await?;

    info!("Kiosk node shutdown complete");

    Ok(())
}

/// Waits for SIGINT/SIGTERM, drains, then closes open event streams so the
/// server can finish.
async fn shutdown_signal(events: Arc<EventBus>) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("NODE_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    }

    // SSE responses never finish on their own.
    events.shutdown();
}
