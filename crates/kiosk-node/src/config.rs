//! Kiosk node configuration.
//!
//! Configuration is loaded from environment variables. Every field has a
//! default so a bare node boots on a frame without any setup.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default PulseAudio sink driven by the volume endpoints.
pub const DEFAULT_SOUND_SINK: &str = "alsa_output.platform-soc_107c000000_sound.stereo-fallback";

/// Default volume change per raise/lower step, in percent.
pub const DEFAULT_VOLUME_STEP: u8 = 5;

/// Default directory uploaded pictures are written to.
pub const DEFAULT_PICTURE_DIR: &str = "pics";

/// Default per-subscriber event queue capacity.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 100;

/// Upper bound for the per-subscriber queue capacity.
pub const MAX_EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Default idle interval before a keep-alive comment is sent.
pub const DEFAULT_EVENT_KEEPALIVE_SECONDS: u64 = 20;

/// Default timeout for a single sound-system command.
pub const DEFAULT_VOLUME_COMMAND_TIMEOUT_SECONDS: u64 = 2;

/// Which sound system the volume endpoints drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeBackend {
    /// `pactl` against a PulseAudio/PipeWire sink.
    Pactl,
    /// Process-local level, for development machines without a sound server.
    Memory,
}

/// Kiosk node configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// Sound system behind the volume endpoints (default: pactl).
    pub volume_backend: VolumeBackend,

    /// PulseAudio sink name passed to `pactl`.
    pub sound_sink: String,

    /// Percent added or removed by one raise/lower action (1..=100).
    pub volume_step: u8,

    /// Directory holding `current.<ext>`; served under `/pics`.
    pub picture_dir: PathBuf,

    /// Bounded queue size per event subscriber.
    pub event_queue_capacity: usize,

    /// Idle time after which a keep-alive comment is emitted.
    pub event_keepalive: Duration,

    /// Timeout applied to each `pactl` invocation.
    pub volume_command_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid volume backend: {0}")]
    InvalidVolumeBackend(String),

    #[error("Invalid volume step configuration: {0}")]
    InvalidVolumeStep(String),

    #[error("Invalid event stream configuration: {0}")]
    InvalidEventStream(String),

    #[error("Invalid volume command timeout configuration: {0}")]
    InvalidVolumeTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let sound_sink = vars
            .get("SOUND_SINK")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SOUND_SINK.to_string());

        let volume_backend = match vars.get("VOLUME_BACKEND").map(String::as_str) {
            None | Some("pactl") => VolumeBackend::Pactl,
            Some("memory") => VolumeBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidVolumeBackend(format!(
                    "VOLUME_BACKEND must be 'pactl' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let picture_dir = vars
            .get("PICTURE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PICTURE_DIR));

        let volume_step = if let Some(value_str) = vars.get("VOLUME_STEP") {
            let value: u8 = value_str.parse().map_err(|e| {
                ConfigError::InvalidVolumeStep(format!(
                    "VOLUME_STEP must be an integer in 1..=100, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > 100 {
                return Err(ConfigError::InvalidVolumeStep(format!(
                    "VOLUME_STEP must be in 1..=100, got {}",
                    value
                )));
            }

            value
        } else {
            DEFAULT_VOLUME_STEP
        };

        let event_queue_capacity = if let Some(value_str) = vars.get("EVENT_QUEUE_CAPACITY") {
            let value: usize = value_str.parse().map_err(|e| {
                ConfigError::InvalidEventStream(format!(
                    "EVENT_QUEUE_CAPACITY must be a positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_EVENT_QUEUE_CAPACITY {
                return Err(ConfigError::InvalidEventStream(format!(
                    "EVENT_QUEUE_CAPACITY must be in 1..={}, got {}",
                    MAX_EVENT_QUEUE_CAPACITY, value
                )));
            }

            value
        } else {
            DEFAULT_EVENT_QUEUE_CAPACITY
        };

        let keepalive_seconds = parse_positive_seconds(
            vars,
            "EVENT_KEEPALIVE_SECONDS",
            DEFAULT_EVENT_KEEPALIVE_SECONDS,
        )
        .map_err(ConfigError::InvalidEventStream)?;

        let volume_timeout_seconds = parse_positive_seconds(
            vars,
            "VOLUME_COMMAND_TIMEOUT_SECONDS",
            DEFAULT_VOLUME_COMMAND_TIMEOUT_SECONDS,
        )
        .map_err(ConfigError::InvalidVolumeTimeout)?;

        Ok(Config {
            bind_address,
            volume_backend,
            sound_sink,
            volume_step,
            picture_dir,
            event_queue_capacity,
            event_keepalive: Duration::from_secs(keepalive_seconds),
            volume_command_timeout: Duration::from_secs(volume_timeout_seconds),
        })
    }
}

fn parse_positive_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, String> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        format!(
            "{} must be a positive integer, got '{}': {}",
            key, value_str, e
        )
    })?;

    if value == 0 {
        return Err(format!("{} must be positive, got 0", key));
    }

    Ok(value)
}
