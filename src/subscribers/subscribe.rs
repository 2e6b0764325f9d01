//! # Subscriber extension point.
//!
//! Hosts observe services by implementing [`Subscribe`] and passing the
//! subscribers to `ServiceBuilder::subscribers`. The
//! [`SubscriberSet`](crate::subscribers::SubscriberSet) gives each one its own
//! queue and task, so a subscriber that writes to a historian or a database
//! never stalls a state transition or its neighbours. When a queue is full the
//! event is dropped for that subscriber only and a `SubscriberOverflow` event
//! reports it.
//!
//! ## Example
//! ```rust
//! use mtpvisor::{Event, EventKind, Subscribe};
//!
//! struct BatchRecord;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for BatchRecord {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::StateChanged && ev.service.as_deref() == Some("dosing") {
//!             // append to the batch record...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "batch-record"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of service and worker events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Runs on the subscriber's own task, one event at a time in publish order.
    async fn on_event(&self, event: &Event);

    /// Label used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events buffered before new ones are dropped for this subscriber.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
