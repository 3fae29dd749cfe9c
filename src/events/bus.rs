//! # Event bus for broadcasting cluster events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The orchestrator is the
//! only regular publisher; the subscriber fan-out publishes overflow/panic reports.
//!
//! ## Architecture
//! ```text
//! Orchestrator ──┐
//!                ├──► Bus ──┬──► subscriber listener ──► SubscriberSet
//! SubscriberSet ─┘          └──► ClusterHandle::subscribe() receivers
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: events sent with no receivers are lost.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for cluster events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_in_publish_order() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ReloadComplete));
        bus.publish(Event::new(EventKind::Exit { code: 0, signal: None }));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::ReloadComplete);
        assert!(second.is_exit());
        assert!(first.seq < second.seq);
    }

    #[test]
    fn publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ReloadComplete));
    }
}
