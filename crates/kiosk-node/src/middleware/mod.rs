//! HTTP middleware for the kiosk node.

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
