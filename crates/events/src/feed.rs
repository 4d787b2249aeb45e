//! Observer fan-out for pipeline events.
//!
//! A bounded broadcast: a slow or absent subscriber never blocks the
//! pipeline. Subscribers that fall behind lose the oldest events
//! (`RecvError::Lagged`) rather than growing memory unboundedly.

use crate::{ActionOutcome, GestureOccurrence};
use tokio::sync::broadcast;

/// Default per-subscriber backlog before oldest events are dropped.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Event delivered to feed subscribers.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A gesture was confirmed (pre-dispatch, for immediate feedback).
    Occurrence(GestureOccurrence),
    /// A dispatch attempt completed.
    Outcome(ActionOutcome),
}

/// Best-effort fan-out of occurrence and outcome events.
#[derive(Clone)]
pub struct EventFeed {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventFeed {
    /// Create a feed with the default backlog capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Create a feed with a custom backlog capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Zero subscribers is a normal condition, not an error.
    pub fn publish(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event feed has no subscribers");
        }
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}
