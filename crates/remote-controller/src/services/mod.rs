//! Service layer for the remote controller.
//!
//! - `node_client` - HTTP client for a party's kiosk node
//! - `orchestrator` - two-node call orchestration and pass-throughs

pub mod node_client;
pub mod orchestrator;

pub use node_client::{CallAction, NodeApi, NodeClient, PictureUpload, PictureStored, VolumeAction};
pub use orchestrator::CallOrchestrator;
