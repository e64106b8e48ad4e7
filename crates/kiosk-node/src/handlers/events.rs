//! Server-sent event stream.

use crate::routes::AppState;
use crate::services::StreamFrame;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

/// `GET /api/events`
///
/// Each published event is sent as one `data:` line holding its JSON.
/// After the configured idle interval a `: ping` comment is sent instead.
/// The subscription is released when the client disconnects.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.events.subscribe();
    info!(target: "kiosk.events", subscriber_id = subscription.id(), "Event stream opened");

    let frames = stream::unfold(subscription, |mut subscription| async move {
        let event = match subscription.next_frame().await? {
            StreamFrame::Message(message) => Event::default().data(&*message),
            StreamFrame::KeepAlive => Event::default().comment("ping"),
        };
        Some((Ok(event), subscription))
    });

    Sse::new(frames)
}
