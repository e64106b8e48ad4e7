//! Common types shared by the kiosk node and the remote controller.
//!
//! The node serves these types over HTTP and the controller parses them
//! back, so both sides agree on a single wire format.

#![warn(clippy::pedantic)]

/// Module for call-signaling wire types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
