//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by state machines, services, state
//! workers and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `StateMachine` (state changes, rejected commands),
//!   `Service` (mode changes), the worker runner (worker lifecycle),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the per-service forwarder feeding the `SubscriberSet`,
//!   plus any receiver obtained from [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
