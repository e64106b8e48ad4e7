//! Remote controller
//!
//! Lets either party of a two-frame pair drive a call and the other
//! frame's controls from a phone or laptop:
//!
//! - Orchestrated call actions across both kiosk nodes (`/api/{party}/call/*`)
//! - A combined status view of both nodes (`/api/{party}/status`)
//! - Volume, reactions and pictures sent to the other party's frame
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/orchestrator.rs -> services/node_client.rs
//! ```
//!
//! The controller keeps no call state; both nodes are the source of truth
//! and are reached only through their HTTP API.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
