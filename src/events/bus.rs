//! Publish-only fan-out to subscribers (§2.8, §5, §9).
//!
//! Modeled as a single bounded `tokio::sync::broadcast` channel rather than a
//! channel-per-subscriber registry: every subscriber gets its own receiver
//! handle cloned from one sender, broadcast is non-blocking, and a slow
//! subscriber lags and drops rather than stalling the run. This mirrors the
//! teacher's own use of a broadcast channel for out-of-band signaling.

use tokio::sync::broadcast;

use super::event::Event;

/// Default channel capacity; past this many unconsumed events a lagging
/// subscriber starts missing the oldest ones. The skip is not silent: the
/// subscription accumulates how many it missed, readable via
/// `EventSubscription::skipped_count`.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out publisher. Cheap to clone; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

/// A subscriber's receiving half.
pub struct EventSubscription {
    receiver: broadcast::Receiver<Event>,
    skipped: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers. Never blocks; if there
    /// are no subscribers the event is simply dropped.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Registers a new subscriber, which will only see events published
    /// after this call.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            skipped: 0,
        }
    }

    /// Number of currently-registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSubscription {
    /// Awaits the next event. Returns `None` only if the bus itself has been
    /// fully dropped (should not happen while the engine is alive). A lagging
    /// subscriber skips forward to the oldest event still buffered rather
    /// than erroring out of the stream; the number skipped is added to
    /// `skipped_count` instead of being silently discarded.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.skipped += skipped;
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Total events this subscriber has missed to lag, across its lifetime.
    /// Callers that care about desync (e.g. the SSE adapter) can poll this
    /// alongside `recv` to know their view skipped forward.
    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }
}
