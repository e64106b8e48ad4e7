//! HTTP request handlers for the kiosk node.

pub mod call;
pub mod events;
pub mod frame;
pub mod health;
pub mod metrics;

pub use call::{
    accept_call, decline_call, end_call, get_call_state, initiate_call, receive_call, reset_call,
};
pub use events::event_stream;
pub use frame::{get_volume, lower_volume, post_reaction, raise_volume, toggle_mute, upload_picture};
pub use health::health_check;
pub use metrics::metrics_handler;
