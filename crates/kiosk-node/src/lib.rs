//! Kiosk node
//!
//! Runs on each picture frame and owns that frame's side of a call:
//!
//! - A single-session call state machine (`/api/call/*`)
//! - A live event stream for the frame UI (`/api/events`, SSE)
//! - Frame controls: volume, reactions, the displayed picture
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs
//! ```
//!
//! Every state change is published through the [`services::EventBus`];
//! handlers never write to subscribers directly.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
