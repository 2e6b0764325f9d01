//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   StateMachine / worker runner ── publish(Event) ──► Bus
//!                                                      │
//!                                            per-service forwarder
//!                                                      │
//!                                                      ▼
//!                                               SubscriberSet::emit
//!                                          ┌───────────┼───────────┐
//!                                          ▼           ▼           ▼
//!                                      LogWriter    Metrics      Custom
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
