//! # mtpvisor
//!
//! **mtpvisor** is a service lifecycle engine for modular process equipment
//! (PEAs) described by a Module Type Package.
//!
//! A PEA exposes *services*. Each service runs through a fixed lifecycle
//! (idle → starting → execute → completing → completed, with pause, hold,
//! stop and abort branches), is gated by operator/automatic mode arbitration
//! and a per-state command mask, and drives user business logic in
//! cancellable async workers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   binding (wire server, manifest tool)
//!        │  Pea::nodes(): attribute + path + writable
//!        ▼
//! ┌────────────────────────────────────────────────────────────────┐
//! │ Service                                                        │
//! │                                                                │
//! │  OperationSourceMode ──enter/exit hooks──┐                     │
//! │   (offline/operator/automatic,           │                     │
//! │    internal/external source)             ▼                     │
//! │                                                                │
//! │  CommandOp/Int/Ext ──► StateMachine ◄── CommandEnControl       │
//! │                          │     ▲   ◄── ProcedureControl        │
//! │          execution routine     │ state_change (auto-advance)   │
//! │                          ▼     │                               │
//! │                      ThreadControl ──► one worker per state    │
//! │                          (generation + cancellation token)     │
//! │                          │                                     │
//! │                          ▼                                     │
//! │                     ServiceLogic::<state>(&ServiceContext)     │
//! └──────────────────────────┬─────────────────────────────────────┘
//!                            ▼
//!                 Bus (broadcast) ──► forwarder ──► SubscriberSet
//!                                                  ├─► LogWriter
//!                                                  └─► user subscribers
//! ```
//!
//! ### Worker lifecycle
//! ```text
//! transition to S ──► request_state(S) ──► reallocate_running_thread()
//!                                             │
//!                      cancel previous token, generation += 1, spawn
//!                                             │
//!      handler returns ── Ok ─────► still current? ─► state_change()
//!                      ── Canceled ► nothing
//!                      ── Err/panic ► last_exception, exception handler
//! ```
//!
//! ## Features
//! | Area               | Description                                            | Key types                                   |
//! |--------------------|--------------------------------------------------------|---------------------------------------------|
//! | **Attributes**     | Typed observable cells with subscriber fan-out          | [`Attribute`], [`Value`], [`DataType`]       |
//! | **Assemblies**     | Indicators, parameters, operation and active elements   | [`DataAssembly`], [`ParameterElement`]       |
//! | **Modes**          | Operator/automatic arbitration with linked propagation  | [`OperationSourceMode`]                      |
//! | **Lifecycle**      | Command codes, enable mask, procedures, state machine   | [`StateMachine`], [`Procedure`]              |
//! | **Runtime**        | One cancellable worker per service                       | [`ThreadControl`], [`WorkerContext`]         |
//! | **Services**       | User logic wired to the lifecycle                        | [`Service`], [`ServiceLogic`]                |
//! | **Events**         | Broadcast bus and subscriber fan-out                      | [`Bus`], [`Event`], [`Subscribe`]            |
//! | **Errors**         | Typed construction and worker errors                      | [`ServiceError`], [`StateError`]             |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mtpvisor::{
//!     LogWriter, Pea, Procedure, Service, ServiceContext, ServiceLogic, StateError, Subscribe,
//! };
//!
//! struct Mixer;
//!
//! #[async_trait::async_trait]
//! impl ServiceLogic for Mixer {
//!     async fn starting(&self, _ctx: &ServiceContext) -> Result<(), StateError> {
//!         Ok(())
//!     }
//!
//!     async fn execute(&self, ctx: &ServiceContext) -> Result<(), StateError> {
//!         while ctx.sleep(Duration::from_millis(100)).await {
//!             // stir...
//!         }
//!         Err(StateError::Canceled)
//!     }
//!
//!     async fn completing(&self, _ctx: &ServiceContext) -> Result<(), StateError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::default())];
//!     let mixer = Service::builder("mixer", "stirring", Mixer)
//!         .hold_loop(true)
//!         .subscribers(subs)
//!         .build()?;
//!     mixer.add_procedure(Procedure::new(1, "continuous", "", false, true)?);
//!
//!     let mut pea = Pea::new();
//!     pea.add_service(mixer)?;
//!     for node in pea.nodes() {
//!         let _ = (node.path, node.writable);
//!     }
//!
//!     pea.shutdown().await;
//!     Ok(())
//! }
//! ```
mod assembly;
mod attribute;
mod config;
mod control;
mod error;
mod events;
mod mode;
mod pea;
mod runtime;
mod service;
mod subscribers;

// ---- Public re-exports ----

pub use assembly::{
    ActiveElement, DataAssembly, Element, ElementKind, IndicatorElement, IndicatorKind, Limits,
    OperationElement, OperationKind, ParameterElement, ParameterKind, Scale,
};
pub use attribute::{
    Attribute, AttributeMap, CommunicationCallback, DataType, SubscriptionCallback, Value,
    DEFAULT_SUBSCRIPTION, MAX_FANOUT_DEPTH,
};
pub use config::ServiceConfig;
pub use control::{
    Command, CommandEnControl, ExecutionRoutine, Procedure, ProcedureControl, State,
    StateMachine, UnknownCode,
};
pub use error::{ProcedureError, ServiceError, StateError};
pub use events::{Bus, Event, EventKind};
pub use mode::{
    ModeCallback, OperationMode, OperationSourceMode, SourceMode, SourceModeOperationElement,
};
pub use pea::{Node, Pea};
pub use runtime::{StateTask, StateTaskRef, TaskFn, ThreadControl, WorkerContext, WorkerHooks};
pub use service::{ExceptionHandler, Service, ServiceBuilder, ServiceContext, ServiceLogic};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
