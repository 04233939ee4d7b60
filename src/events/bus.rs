//! # Event bus.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] channel shared by every publisher in the
//! crate: the distributor itself, watch tickers and subscriber workers.
//!
//! ```text
//! Distributor ──┐
//! Ticker 1..N ──┼──► Bus ──┬──► subscriber listener ──► SubscriberSet
//! Sub workers ──┘          └──► Distributor::subscribe() receivers
//! ```
//!
//! `publish()` runs on the reading hot path: it never blocks and never fails.
//! With no receivers the event is simply dropped; callers on the hot path can
//! check [`Bus::is_idle`] to skip building the event at all.
//!
//! The ring buffer is shared by all receivers and holds the last `capacity` events.
//! A receiver that falls behind gets `RecvError::Lagged(n)` and resumes after the
//! `n` skipped events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for distributor events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding up to `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes `ev` to every current receiver; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Returns true if nobody is listening (publishing is then a no-op).
    pub fn is_idle(&self) -> bool {
        self.tx.receiver_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = Bus::new(4);
        assert!(bus.is_idle());
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::StreamStarted));
        let ev = rx.recv().await.expect("event delivered");
        assert_eq!(ev.kind, EventKind::StreamStarted);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let bus = Bus::new(0);
        let _rx = bus.subscribe();
        bus.publish(Event::new(EventKind::StreamStopped));
    }
}
