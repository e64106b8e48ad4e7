//! Kiosk node services.
//!
//! Handlers call into these; none of them know about HTTP.

pub mod call_state;
pub mod event_bus;
pub mod pictures;
pub mod volume;

pub use call_state::CallStateMachine;
pub use event_bus::{EventBus, StreamFrame, Subscription};
pub use pictures::PictureStore;
pub use volume::{PactlVolume, VolumeControl, VolumeService};
