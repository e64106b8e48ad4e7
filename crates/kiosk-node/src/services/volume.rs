//! Audio output control.
//!
//! [`VolumeControl`] is the seam to the sound system. Production nodes use
//! [`PactlVolume`], which shells out to `pactl` with a per-command timeout;
//! tests use [`mock::InMemoryVolume`].
//!
//! Raise/lower/mute are composed from the trait's primitives by
//! [`VolumeService`], which clamps levels to 0..=100 and mutes the sink
//! exactly when the level reaches 0.

use crate::errors::NodeError;
use crate::observability::metrics::record_volume_command;
use async_trait::async_trait;
use common::types::VolumeStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Primitive operations on the node's audio sink.
#[async_trait]
pub trait VolumeControl: Send + Sync {
    /// Current level and mute flag.
    async fn status(&self) -> Result<VolumeStatus, NodeError>;

    /// Set the output level (already clamped to 0..=100).
    async fn set_level(&self, percent: u8) -> Result<(), NodeError>;

    /// Mute or unmute the sink.
    async fn set_muted(&self, muted: bool) -> Result<(), NodeError>;
}

/// Volume actions exposed over HTTP.
#[derive(Clone)]
pub struct VolumeService {
    control: Arc<dyn VolumeControl>,
    step: u8,
}

impl VolumeService {
    pub fn new(control: Arc<dyn VolumeControl>, step: u8) -> Self {
        Self { control, step }
    }

    pub async fn status(&self) -> Result<VolumeStatus, NodeError> {
        self.control.status().await
    }

    /// Raise the level by one step, unmuting the sink.
    #[instrument(skip(self), name = "kiosk.volume.raise")]
    pub async fn raise(&self) -> Result<VolumeStatus, NodeError> {
        self.adjust(i16::from(self.step)).await
    }

    /// Lower the level by one step; reaching 0 mutes the sink.
    #[instrument(skip(self), name = "kiosk.volume.lower")]
    pub async fn lower(&self) -> Result<VolumeStatus, NodeError> {
        self.adjust(-i16::from(self.step)).await
    }

    /// Flip the mute flag without touching the level.
    #[instrument(skip(self), name = "kiosk.volume.toggle_mute")]
    pub async fn toggle_mute(&self) -> Result<VolumeStatus, NodeError> {
        let current = self.control.status().await?;
        self.control.set_muted(!current.muted).await?;
        self.control.status().await
    }

    async fn adjust(&self, delta: i16) -> Result<VolumeStatus, NodeError> {
        let current = self.control.status().await?;
        let target = clamp_percent(i16::from(current.volume_percent) + delta);

        self.control.set_level(target).await?;
        self.control.set_muted(target == 0).await?;

        debug!(target: "kiosk.volume", from = current.volume_percent, to = target, "Volume adjusted");
        self.control.status().await
    }
}

fn clamp_percent(value: i16) -> u8 {
    u8::try_from(value.clamp(0, 100)).unwrap_or(0)
}

/// `pactl`-backed control of one PulseAudio sink.
pub struct PactlVolume {
    sink: String,
    timeout: Duration,
}

impl PactlVolume {
    pub fn new(sink: impl Into<String>, timeout: Duration) -> Self {
        Self {
            sink: sink.into(),
            timeout,
        }
    }

    async fn run(&self, operation: &'static str, args: &[&str]) -> Result<String, NodeError> {
        let start = Instant::now();
        let result = self.run_inner(args).await;
        let status = if result.is_ok() { "success" } else { "error" };
        record_volume_command(operation, status, start.elapsed());
        result
    }

    async fn run_inner(&self, args: &[&str]) -> Result<String, NodeError> {
        let mut command = Command::new("pactl");
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                warn!(target: "kiosk.volume", args = ?args, "pactl timed out");
                NodeError::Volume(format!("pactl {} timed out", args.join(" ")))
            })?
            .map_err(|e| NodeError::Volume(format!("failed to run pactl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(NodeError::Volume(if stderr.is_empty() {
                format!("pactl {} exited with {}", args.join(" "), output.status)
            } else {
                stderr
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VolumeControl for PactlVolume {
    async fn status(&self) -> Result<VolumeStatus, NodeError> {
        let volume_out = self
            .run("get_volume", &["get-sink-volume", &self.sink])
            .await?;
        let volume_percent = parse_volume_percent(&volume_out)
            .ok_or_else(|| NodeError::Volume("could not parse pactl volume output".to_string()))?;

        let mute_out = self.run("get_mute", &["get-sink-mute", &self.sink]).await?;

        Ok(VolumeStatus {
            volume_percent,
            muted: parse_muted(&mute_out),
        })
    }

    async fn set_level(&self, percent: u8) -> Result<(), NodeError> {
        let level = format!("{}%", percent.min(100));
        self.run("set_volume", &["set-sink-volume", &self.sink, &level])
            .await
            .map(|_| ())
    }

    async fn set_muted(&self, muted: bool) -> Result<(), NodeError> {
        let flag = if muted { "1" } else { "0" };
        self.run("set_mute", &["set-sink-mute", &self.sink, flag])
            .await
            .map(|_| ())
    }
}

/// First `NN%` figure in `pactl get-sink-volume` output.
///
/// Readings above 100% are kept as reported; only new levels are clamped.
///
/// ```text
/// Volume: front-left: 45875 /  70% / -9.29 dB,   front-right: 45875 /  70% / -9.29 dB
/// ```
fn parse_volume_percent(output: &str) -> Option<u8> {
    output
        .split(|c: char| c.is_whitespace() || c == ',' || c == '/')
        .find_map(|token| token.strip_suffix('%')?.parse::<u16>().ok())
        .map(|value| u8::try_from(value).unwrap_or(u8::MAX))
}

/// `pactl get-sink-mute` prints `Mute: yes` or `Mute: no`.
fn parse_muted(output: &str) -> bool {
    output
        .rsplit(':')
        .next()
        .map(|value| value.trim().eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

pub mod mock {
    //! In-memory sound system for tests and local development.

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    pub struct InMemoryVolume {
        state: Mutex<VolumeStatus>,
        failing: AtomicBool,
    }

    impl InMemoryVolume {
        pub fn new(volume_percent: u8, muted: bool) -> Self {
            Self {
                state: Mutex::new(VolumeStatus {
                    volume_percent,
                    muted,
                }),
                failing: AtomicBool::new(false),
            }
        }

        /// Make every subsequent call fail like an unreachable sound server.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), NodeError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(NodeError::Volume(
                    "Connection failure: Connection refused".to_string(),
                ));
            }
            Ok(())
        }
    }

    impl Default for InMemoryVolume {
        fn default() -> Self {
            Self::new(50, false)
        }
    }

    #[async_trait]
    impl VolumeControl for InMemoryVolume {
        async fn status(&self) -> Result<VolumeStatus, NodeError> {
            self.check()?;
            Ok(*self.state.lock().await)
        }

        async fn set_level(&self, percent: u8) -> Result<(), NodeError> {
            self.check()?;
            self.state.lock().await.volume_percent = percent.min(100);
            Ok(())
        }

        async fn set_muted(&self, muted: bool) -> Result<(), NodeError> {
            self.check()?;
            self.state.lock().await.muted = muted;
            Ok(())
        }
    }
}
