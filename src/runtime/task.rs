//! # State task abstraction and function-backed implementation.
//!
//! A [`StateTask`] is the unit a state worker runs: an async, cancelable body
//! receiving a [`WorkerContext`]. [`TaskFn`] wraps a closure producing a fresh
//! future per spawn, so no state leaks between two entries of the same state.
//! The common handle type is [`StateTaskRef`].
//!
//! ## Example
//! ```rust
//! use mtpvisor::{StateError, StateTaskRef, TaskFn, WorkerContext};
//!
//! let t: StateTaskRef = TaskFn::arc("execute", |ctx: WorkerContext| async move {
//!     ctx.checkpoint()?;
//!     // do work...
//!     Ok::<_, StateError>(())
//! });
//!
//! assert_eq!(t.name(), "execute");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::WorkerContext;
use crate::error::StateError;

/// # Asynchronous, cancelable body of a lifecycle state.
///
/// Returning `Ok(())` lets the service auto-advance to the successor state
/// (if the worker is still current). Returning `Err(StateError::Canceled)` is
/// a graceful exit.
#[async_trait]
pub trait StateTask: Send + Sync + 'static {
    /// Stable, human-readable name (for logs).
    fn name(&self) -> &str;

    /// Runs the state body until completion or cancellation.
    async fn run(&self, ctx: WorkerContext) -> Result<(), StateError>;
}

/// Shared handle to a state task.
pub type StateTaskRef = Arc<dyn StateTask>;

/// Function-backed state task.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> StateTask for TaskFn<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StateError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: WorkerContext) -> Result<(), StateError> {
        (self.f)(ctx).await
    }
}
