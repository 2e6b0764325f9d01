//! Lifecycle control: codes, command permissions, procedures and the state
//! machine.
//!
//! ## Contents
//! - [`Command`], [`State`] wire codes with name lookup
//! - [`CommandEnControl`] per-state command permissions (`CommandEn`)
//! - [`Procedure`], [`ProcedureControl`] procedure registry and selection
//! - [`StateMachine`] command dispatch and transitions

mod codes;
mod command_en;
mod procedure;
mod procedure_control;
mod state_machine;

pub use codes::{Command, State, UnknownCode};
pub use command_en::CommandEnControl;
pub use procedure::Procedure;
pub(crate) use procedure::upsert;
pub use procedure_control::ProcedureControl;
pub use state_machine::{ExecutionRoutine, StateMachine};
