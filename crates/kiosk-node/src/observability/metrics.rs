//! Metrics definitions for the kiosk node.
//!
//! All metrics follow Prometheus naming conventions:
//! - `kiosk_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: fixed route table, unknown paths become `/other`
//! - `kind`: 4 event kinds
//! - `action`/`outcome`: bounded by the call state machine
//! - `operation`: bounded by the pactl wrapper

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by
/// `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("kiosk_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // pactl calls are bounded by the command timeout (2s default)
        .set_buckets_for_metric(
            Matcher::Prefix("kiosk_volume_command".to_string()),
            &[0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set volume command buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `kiosk_http_requests_total`, `kiosk_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Long-lived `/api/events` streams are recorded when their headers are
/// sent, not when the stream closes.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("kiosk_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("kiosk_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/call/state" => "/api/call/state",
        "/api/call/initiate" => "/api/call/initiate",
        "/api/call/receive" => "/api/call/receive",
        "/api/call/accept" => "/api/call/accept",
        "/api/call/decline" => "/api/call/decline",
        "/api/call/end" => "/api/call/end",
        "/api/call/reset" => "/api/call/reset",
        "/api/events" => "/api/events",
        "/api/volume" => "/api/volume",
        "/api/volume/raise" => "/api/volume/raise",
        "/api/volume/lower" => "/api/volume/lower",
        "/api/volume/mute" => "/api/volume/mute",
        "/api/reaction" => "/api/reaction",
        "/api/picture" => "/api/picture",
        p if p.starts_with("/pics/") => "/pics/{file}",
        _ => "/other",
    }
}

// ============================================================================
// Event Stream Metrics
// ============================================================================

/// Metric: `kiosk_events_published_total`
/// Labels: `kind`
pub fn record_event_published(kind: &'static str) {
    counter!("kiosk_events_published_total", "kind" => kind).increment(1);
}

/// Record an event dropped because one subscriber's queue was full.
///
/// Metric: `kiosk_events_dropped_total`
/// Labels: `kind`
pub fn record_event_dropped(kind: &'static str) {
    counter!("kiosk_events_dropped_total", "kind" => kind).increment(1);
}

/// Metric: `kiosk_event_subscribers`
pub fn set_event_subscribers(count: usize) {
    gauge!("kiosk_event_subscribers").set(count as f64);
}

// ============================================================================
// Call Metrics
// ============================================================================

/// Record a call state machine action
///
/// Metric: `kiosk_call_transitions_total`
/// Labels: `action` (initiate, receive, accept, decline, end, reset),
/// `outcome` (success, conflict, not_found, invalid, error)
pub fn record_call_transition(action: &'static str, outcome: &'static str) {
    counter!("kiosk_call_transitions_total",
        "action" => action,
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Volume Metrics
// ============================================================================

/// Record one sound-system command
///
/// Metric: `kiosk_volume_command_duration_seconds`, `kiosk_volume_commands_total`
/// Labels: `operation`, `status`
pub fn record_volume_command(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("kiosk_volume_command_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("kiosk_volume_commands_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}
