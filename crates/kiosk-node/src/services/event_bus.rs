//! In-process fan-out of node events to live stream subscribers.
//!
//! Every subscriber owns a bounded queue. Publishing never blocks: an event
//! that does not fit in a subscriber's queue is dropped for that subscriber
//! only, and other subscribers still receive it. Events are serialized once
//! per publish and shared between queues.
//!
//! A [`Subscription`] unregisters itself when dropped, so a client that
//! disconnects stops receiving events without any explicit cleanup.

use crate::models::NodeEvent;
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// One unit written to a live event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A serialized [`NodeEvent`].
    Message(Arc<str>),
    /// Nothing was published within the keep-alive interval.
    KeepAlive,
}

type SubscriberMap = HashMap<u64, mpsc::Sender<Arc<str>>>;

/// Registry of live event subscribers.
pub struct EventBus {
    subscribers: Mutex<SubscriberMap>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    capacity: usize,
    keepalive: Duration,
    shutdown: CancellationToken,
}

impl EventBus {
    /// Create a bus whose subscribers buffer up to `capacity` events and
    /// receive a keep-alive after `keepalive` of silence.
    pub fn new(capacity: usize, keepalive: Duration) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            capacity: capacity.max(1),
            keepalive,
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a new subscriber with an empty queue.
    ///
    /// Only events published after this call are delivered.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let count = {
            let mut subscribers = self.lock_subscribers();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        metrics::set_event_subscribers(count);
        debug!(target: "kiosk.events", subscriber_id = id, subscribers = count, "Subscriber registered");

        Subscription {
            id,
            receiver,
            keepalive: self.keepalive,
            shutdown: self.shutdown.clone(),
            bus: Arc::clone(self),
        }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Returns the number of subscribers whose queue accepted the event.
    #[instrument(skip_all, fields(kind = event.kind()))]
    pub fn publish(&self, event: &NodeEvent) -> usize {
        let message: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!(target: "kiosk.events", error = %e, "Failed to serialize event");
                return 0;
            }
        };

        // Snapshot senders so no lock is held while queues are written.
        let senders: Vec<(u64, mpsc::Sender<Arc<str>>)> = self
            .lock_subscribers()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sender) in senders {
            match sender.try_send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::record_event_dropped(event.kind());
                    debug!(target: "kiosk.events", subscriber_id = id, "Subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let count = {
                let mut subscribers = self.lock_subscribers();
                for id in &closed {
                    subscribers.remove(id);
                }
                subscribers.len()
            };
            metrics::set_event_subscribers(count);
        }

        metrics::record_event_published(event.kind());
        delivered
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Total events dropped because a subscriber queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// End every open stream. Subscriptions created afterwards end at once.
    pub fn shutdown(&self) {
        info!(target: "kiosk.events", subscribers = self.subscriber_count(), "Closing event streams");
        self.shutdown.cancel();
    }

    fn unregister(&self, id: u64) {
        let count = {
            let mut subscribers = self.lock_subscribers();
            subscribers.remove(&id);
            subscribers.len()
        };
        metrics::set_event_subscribers(count);
        debug!(target: "kiosk.events", subscriber_id = id, subscribers = count, "Subscriber removed");
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, SubscriberMap> {
        // The map holds no invariants a panicking holder could break.
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// A registered subscriber's end of the bus.
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<str>>,
    keepalive: Duration,
    shutdown: CancellationToken,
    bus: Arc<EventBus>,
}

impl Subscription {
    /// Subscriber id, unique for the lifetime of the bus.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next frame to write to the stream.
    ///
    /// Yields queued events in publish order, a keep-alive after the idle
    /// interval, or `None` once the bus is shut down.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            message = self.receiver.recv() => message.map(StreamFrame::Message),
            () = tokio::time::sleep(self.keepalive) => Some(StreamFrame::KeepAlive),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unregister(self.id);
    }
}
