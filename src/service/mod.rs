//! Services: user logic bound to the lifecycle engine.
//!
//! ## Contents
//! - [`ServiceLogic`] per-state async handlers with a delegation chain
//! - [`ServiceContext`] what a handler sees (cancellation, procedure, state machine)
//! - [`Service`] the wired service
//! - [`ServiceBuilder`] construction from a config, logic and subscribers

mod builder;
mod context;
mod logic;
#[allow(clippy::module_inception)]
mod service;

pub use builder::ServiceBuilder;
pub use context::ServiceContext;
pub use logic::ServiceLogic;
pub use service::{ExceptionHandler, Service};
