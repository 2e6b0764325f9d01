//! Operation and source mode arbitration.
//!
//! ## Contents
//! - [`OperationSourceMode`] offline/operator/automatic × internal/external
//!   (services) or internal/manual (active elements), with linked mirroring
//! - [`SourceModeOperationElement`] source-only arbitration for `*ManInt`
//!   operation elements
//! - [`OperationMode`], [`SourceMode`] read-side views of the act flags

mod channel;
mod op_src_mode;
mod operation_element;
mod source;

pub(crate) use channel::RequestChannel;
pub use op_src_mode::{ModeCallback, OperationMode, OperationSourceMode};
pub use operation_element::SourceModeOperationElement;
pub use source::SourceMode;
