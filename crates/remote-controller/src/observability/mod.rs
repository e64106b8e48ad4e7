//! Observability for the remote controller.

pub mod metrics;
