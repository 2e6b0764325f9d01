//! # Run one state worker to completion.
//!
//! Executes a [`StateTask`] once, isolates panics and publishes exactly one
//! terminal worker event to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   task.run() → Ok(())          → publish WorkerStopped
//!
//! Cancellation:
//!   task.run() → Err(Canceled)   → publish WorkerCanceled (graceful exit)
//!
//! Failure:
//!   task.run() → Err(Fail/Fatal) → publish WorkerFailed
//!   task.run() → panic           → Err(Panicked) → publish WorkerFailed
//! ```
//!
//! What happens afterwards (auto-advance, exception routing) is decided by
//! [`ThreadControl`](super::ThreadControl), not here.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::debug;

use super::context::WorkerContext;
use super::task::StateTask;
use crate::error::StateError;
use crate::events::{Bus, Event, EventKind};

/// Executes `task` once with `ctx`, publishing the terminal event to `bus`.
pub(crate) async fn run_state<T: StateTask + ?Sized>(
    task: &T,
    ctx: WorkerContext,
    bus: &Bus,
) -> Result<(), StateError> {
    debug!(
        service = %ctx.service(),
        state = %ctx.state(),
        generation = ctx.generation(),
        task = task.name(),
        "worker running"
    );

    let res = match AssertUnwindSafe(task.run(ctx.clone())).catch_unwind().await {
        Ok(res) => res,
        Err(panic_err) => Err(StateError::Panicked {
            info: panic_message(&*panic_err),
        }),
    };

    let kind = match &res {
        Ok(()) => EventKind::WorkerStopped,
        Err(StateError::Canceled) => EventKind::WorkerCanceled,
        Err(_) => EventKind::WorkerFailed,
    };
    let mut ev = worker_event(kind, &ctx);
    if let Err(e) = &res {
        if !e.is_canceled() {
            ev = ev.with_reason(e.to_string());
        }
    }
    bus.publish(ev);
    res
}

pub(crate) fn worker_event(kind: EventKind, ctx: &WorkerContext) -> Event {
    Event::new(kind)
        .with_service(ctx.service())
        .with_state(ctx.state())
        .with_generation(ctx.generation())
}

fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
