//! # Typed attribute values and best-effort coercion.
//!
//! Every [`Attribute`](crate::Attribute) declares a [`DataType`]. Writes are
//! coerced into that type with [`Value::coerce`]; when coercion fails the
//! type's zero value is stored instead and the write still succeeds.
//!
//! ## Coercion table
//! ```text
//! from \ to   Bool              Int                  Float           String
//! Bool        b                 0 / 1                0.0 / 1.0       "true"/"false"
//! Int         i != 0            i                    i as f64        "42"
//! Float       f != 0.0          trunc (finite only)  f               "1.5"
//! String      true/false/1/0    parse i64            parse f64       s
//! ```
//! Anything outside the table (unparsable strings, NaN/inf → Int) yields the
//! zero value of the target type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
}

impl DataType {
    /// Zero value of the type (`false`, `0`, `0.0`, `""`).
    pub fn zero(self) -> Value {
        match self {
            DataType::Bool => Value::Bool(false),
            DataType::Int => Value::Int(0),
            DataType::Float => Value::Float(0.0),
            DataType::String => Value::String(String::new()),
        }
    }

    /// Short stable label, used by bindings to pick a wire type.
    pub fn as_label(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::String => "string",
        }
    }
}

/// Dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Returns the type this value currently holds.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
        }
    }

    /// Converts into `target`, or `None` if the conversion is not possible.
    pub fn try_coerce(&self, target: DataType) -> Option<Value> {
        match (self, target) {
            (Value::Bool(b), DataType::Bool) => Some(Value::Bool(*b)),
            (Value::Int(i), DataType::Bool) => Some(Value::Bool(*i != 0)),
            (Value::Float(f), DataType::Bool) => Some(Value::Bool(*f != 0.0)),
            (Value::String(s), DataType::Bool) => parse_bool(s).map(Value::Bool),

            (Value::Bool(b), DataType::Int) => Some(Value::Int(i64::from(*b))),
            (Value::Int(i), DataType::Int) => Some(Value::Int(*i)),
            (Value::Float(f), DataType::Int) => float_to_int(*f).map(Value::Int),
            (Value::String(s), DataType::Int) => s.trim().parse::<i64>().ok().map(Value::Int),

            (Value::Bool(b), DataType::Float) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
            (Value::Int(i), DataType::Float) => Some(Value::Float(*i as f64)),
            (Value::Float(f), DataType::Float) => Some(Value::Float(*f)),
            (Value::String(s), DataType::Float) => s.trim().parse::<f64>().ok().map(Value::Float),

            (v, DataType::String) => Some(Value::String(v.to_string())),
        }
    }

    /// Converts into `target`, substituting the zero value on failure.
    pub fn coerce(&self, target: DataType) -> Value {
        self.try_coerce(target).unwrap_or_else(|| target.zero())
    }

    /// Reads the value as a boolean (coercing; `false` on failure).
    pub fn as_bool(&self) -> bool {
        matches!(self.coerce(DataType::Bool), Value::Bool(true))
    }

    /// Reads the value as an integer (coercing; `0` on failure).
    pub fn as_int(&self) -> i64 {
        match self.coerce(DataType::Int) {
            Value::Int(i) => i,
            _ => 0,
        }
    }

    /// Reads the value as a float (coercing; `0.0` on failure).
    pub fn as_float(&self) -> f64 {
        match self.coerce(DataType::Float) {
            Value::Float(f) => f,
            _ => 0.0,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let t = f.trunc();
    if t < i64::MIN as f64 || t > i64::MAX as f64 {
        return None;
    }
    Some(t as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
