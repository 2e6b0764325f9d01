//! # Lifecycle event fan-out.
//!
//! Every service owns (or shares) one [`Bus`]. The state machine announces
//! transitions and rejected commands on it, the worker runner announces
//! worker starts, stops and failures, and the mode hooks announce mode
//! changes. Receivers are the per-service forwarder feeding the
//! `SubscriberSet`, plus any host code that called [`Bus::subscribe`].
//!
//! ```text
//! StateMachine ─ StateChanged, CommandRejected ─┐
//! mode hooks   ─ ModeChanged ───────────────────┼─► Bus ─┬─► forwarder ─► SubscriberSet
//! run_state    ─ Worker* ───────────────────────┘        └─► Service::subscribe()
//! ```
//!
//! Passing one bus to several `ServiceBuilder::bus` calls merges the streams
//! of a whole PEA into one subscriber set.
//!
//! Publishing happens inside the transition gate, so it must never wait: a
//! full ring overwrites its oldest slot and lagging receivers see
//! `RecvError::Lagged(n)`. Events published while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Shared sender of lifecycle events. Clones publish into the same ring.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Ring of `capacity` slots (at least one) shared by all receivers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every receiver alive right now.
    pub fn publish(&self, ev: Event) {
        // Err only means no receiver exists.
        let _ = self.tx.send(ev);
    }

    /// New receiver; it starts with the next published event.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receiver_starts_at_subscription() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::WorkerStarting));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::WorkerStopped).with_service("svc"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::WorkerStopped);
        assert_eq!(ev.service.as_deref(), Some("svc"));
    }

    #[tokio::test]
    async fn test_lagging_receiver_skips_oldest() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for svc in ["a", "b", "c"] {
            bus.publish(Event::new(EventKind::StateChanged).with_service(svc));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.service.as_deref(), Some("b"));
    }
}
