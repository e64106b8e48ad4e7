//! # Kiosk Test Utilities
//!
//! Shared test utilities for the kiosk node and the remote controller.
//!
//! This crate provides:
//! - Server harnesses (`TestKioskNode`, `TestRemoteController`)
//! - An SSE reader for `/api/events` (`EventStreamReader`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiosk_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let adam = TestKioskNode::spawn().await?;
//!     let steve = TestKioskNode::spawn().await?;
//!     let rc = TestRemoteController::spawn(&adam, &steve).await?;
//!
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/api/adam/call/initiate", rc.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod event_stream;
pub mod server_harness;

// Re-export commonly used items
pub use event_stream::*;
pub use server_harness::*;
