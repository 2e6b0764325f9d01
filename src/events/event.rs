//! # Lifecycle events emitted by services and their workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Control events**: state transitions, rejected commands, mode changes
//! - **Worker events**: state workers starting, stopping, cancelled, failing
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries the metadata: service tag, state codes,
//! command, worker generation and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use mtpvisor::{Event, EventKind, State};
//!
//! let ev = Event::new(EventKind::StateChanged)
//!     .with_service("dosing")
//!     .with_state(State::Execute)
//!     .with_previous(State::Starting);
//!
//! assert_eq!(ev.kind, EventKind::StateChanged);
//! assert_eq!(ev.service.as_deref(), Some("dosing"));
//! assert_eq!(ev.state, Some(State::Execute));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::control::{Command, State};
use crate::mode::OperationMode;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `service`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `service`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Control events ===
    /// Lifecycle state changed.
    ///
    /// Sets:
    /// - `service`, `state`, `previous`
    /// - `command`: command that caused it (absent for auto-advance)
    StateChanged,

    /// A command code was dropped (unknown or not enabled).
    ///
    /// Sets:
    /// - `service`, `state`
    /// - `command`: the command, when the code was known
    /// - `reason`: "unknown" or "disabled"
    CommandRejected,

    /// Operation mode changed.
    ///
    /// Sets:
    /// - `service`
    /// - `reason`: the new mode label (`off`, `op`, `aut`)
    ModeChanged,

    // === Worker events ===
    /// Worker for a state was spawned.
    ///
    /// Sets:
    /// - `service`, `state`, `generation`
    WorkerStarting,

    /// Worker returned normally.
    ///
    /// Sets:
    /// - `service`, `state`, `generation`
    WorkerStopped,

    /// Worker observed cancellation and exited gracefully.
    ///
    /// Sets:
    /// - `service`, `state`, `generation`
    WorkerCanceled,

    /// Worker returned an error or panicked.
    ///
    /// Sets:
    /// - `service`, `state`, `generation`
    /// - `reason`: error message
    WorkerFailed,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Service tag (or subscriber name for subscriber events).
    pub service: Option<Arc<str>>,
    /// State after the event.
    pub state: Option<State>,
    /// State before a transition.
    pub previous: Option<State>,
    /// Command involved, if any.
    pub command: Option<Command>,
    /// Worker generation.
    pub generation: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            state: None,
            previous: None,
            command: None,
            generation: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[inline]
    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    #[inline]
    pub fn with_previous(mut self, state: State) -> Self {
        self.previous = Some(state);
        self
    }

    #[inline]
    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a mode change event.
    #[inline]
    pub fn mode_changed(service: impl Into<Arc<str>>, mode: OperationMode) -> Self {
        Event::new(EventKind::ModeChanged)
            .with_service(service)
            .with_reason(mode.as_label())
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
