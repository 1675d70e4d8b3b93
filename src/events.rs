//! Fire-and-forget event publishing.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and a subscriber that falls behind the channel capacity loses the
//! oldest events.

use tokio::sync::broadcast;

use crate::domain::AgentEvent;

/// Sink for step-level events
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: AgentEvent);
}

/// Broadcast channel fan-out to any number of subscribers
pub struct BroadcastPublisher {
    tx: broadcast::Sender<AgentEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: AgentEvent) {
        log::trace!("event {} for run {}", event.event_type(), event.run_id());
        // Err only means nobody is listening
        let _ = self.tx.send(event);
    }
}

/// Discards every event
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: AgentEvent) {}
}
