//! Metrics definitions for the remote controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `endpoint`: party segment replaced by `{party}`, unknown paths become `/other`
//! - `party`: the two configured parties
//! - `path`: fixed node API paths
//! - `operation`/`outcome`: bounded by the orchestrator

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the `/metrics` handle.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("rc_http_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Node legs are bounded by the 5s/10s request timeouts
        .set_buckets_for_metric(
            Matcher::Prefix("rc_node_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set node request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `rc_http_requests_total`, `rc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("rc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("rc_http_requests_total",
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
        "/health" => return "/health",
        "/metrics" => return "/metrics",
        "/api/health" => return "/api/health",
        _ => {}
    }

    let Some(rest) = path.strip_prefix("/api/") else {
        return "/other";
    };
    let Some((_party, action)) = rest.split_once('/') else {
        return "/other";
    };

    match action {
        "status" => "/api/{party}/status",
        "call/initiate" => "/api/{party}/call/initiate",
        "call/accept" => "/api/{party}/call/accept",
        "call/decline" => "/api/{party}/call/decline",
        "call/end" => "/api/{party}/call/end",
        "call/reset" => "/api/{party}/call/reset",
        "volume/raise" | "volume/lower" | "volume/mute" => "/api/{party}/volume/{action}",
        "reaction" => "/api/{party}/reaction",
        "picture" => "/api/{party}/picture",
        _ => "/other",
    }
}

// ============================================================================
// Node Leg Metrics
// ============================================================================

/// Record one request to a node
///
/// Metric: `rc_node_request_duration_seconds`, `rc_node_requests_total`
/// Labels: `party`, `path`, `status` (success, error, unreachable)
pub fn record_node_request(party: &str, path: &str, status: &'static str, duration: Duration) {
    histogram!("rc_node_request_duration_seconds",
        "party" => party.to_string(),
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_node_requests_total",
        "party" => party.to_string(),
        "path" => path.to_string(),
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Orchestration Metrics
// ============================================================================

/// Record one orchestrated operation
///
/// Metric: `rc_orchestration_total`
/// Labels: `operation` (initiate, accept, decline, end, reset, status),
/// `outcome` (success, partial, conflict, not_found, upstream_failure, ...)
pub fn record_orchestration(operation: &'static str, outcome: &'static str) {
    counter!("rc_orchestration_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}
