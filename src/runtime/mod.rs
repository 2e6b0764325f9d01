//! State worker runtime.
//!
//! ## Contents
//! - [`StateTask`], [`TaskFn`], [`StateTaskRef`] what a worker runs
//! - [`WorkerContext`] cancellation and generation checks for handlers
//! - [`ThreadControl`], [`WorkerHooks`] one live worker per service
//!
//! Workers are tokio tasks on the runtime handle captured when the service
//! was built.

mod context;
mod runner;
mod task;
mod thread_control;

pub use context::WorkerContext;
pub use task::{StateTask, StateTaskRef, TaskFn};
pub use thread_control::{ThreadControl, WorkerHooks};
