//! HTTP request handlers for the remote controller.

pub mod call;
pub mod controls;
pub mod health;
pub mod metrics;

pub use call::{accept_call, decline_call, end_call, get_status, initiate_call, reset_call};
pub use controls::{change_volume, send_picture, send_reaction};
pub use health::{api_health, health_check};
pub use metrics::metrics_handler;
