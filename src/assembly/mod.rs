//! Data assemblies and the standard element types built on them.
//!
//! ## Contents
//! - [`DataAssembly`], [`ElementKind`] flat assembly with a capability tag
//! - [`Element`] enumeration surface used by bindings
//! - [`IndicatorElement`] report values and process value outs
//! - [`ParameterElement`] procedure and configuration parameters
//! - [`OperationElement`] manually operated set points
//! - [`ActiveElement`] PEA-owned actuators with their own mode

mod active;
mod data_assembly;
mod indicator;
mod operation;
mod parameter;
mod scale;

pub use active::ActiveElement;
pub use data_assembly::{DataAssembly, Element, ElementKind};
pub use indicator::{IndicatorElement, IndicatorKind};
pub use operation::{OperationElement, OperationKind};
pub use parameter::{ParameterElement, ParameterKind};
pub use scale::{Limits, Scale};
