//! Observability for the kiosk node.
//!
//! Provides metrics definitions and the recorder setup.

pub mod metrics;
