//! Observable, typed value cells.
//!
//! ## Contents
//! - [`DataType`], [`Value`] declared types and best-effort coercion
//! - [`Attribute`] value cell with synchronous subscriber fan-out
//! - [`AttributeMap`] ordered name → attribute collection owned by assemblies
//!
//! Attributes are the only surface bindings touch: external writes come in
//! through [`Attribute::set_value`], outbound changes leave through the
//! communication callback.

mod cell;
mod map;
mod value;

pub use cell::{
    Attribute, CommunicationCallback, SubscriptionCallback, DEFAULT_SUBSCRIPTION, MAX_FANOUT_DEPTH,
};
pub use map::AttributeMap;
pub use value::{DataType, Value};
