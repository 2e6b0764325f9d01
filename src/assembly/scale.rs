//! Scale and limit settings shared by analog and integer elements.

use std::sync::Arc;

use crate::attribute::{Attribute, DataType};

use super::data_assembly::DataAssembly;

/// Display scale (`VSclMin`, `VSclMax`, `VUnit`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
    /// Unit code from the MTP unit table.
    pub unit: i64,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            unit: 0,
        }
    }
}

impl Scale {
    pub fn new(min: f64, max: f64, unit: i64) -> Self {
        Self { min, max, unit }
    }

    pub(crate) fn register(&self, da: &mut DataAssembly, ty: DataType) {
        da.add_attribute(Attribute::new("VSclMin", ty, self.min));
        da.add_attribute(Attribute::new("VSclMax", ty, self.max));
        da.add_attribute(Attribute::new("VUnit", DataType::Int, self.unit));
    }
}

/// Accepted value range (`VMin`, `VMax`), inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: f64,
    pub max: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

impl Limits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub(crate) fn register(&self, da: &mut DataAssembly, ty: DataType) -> RangeCheck {
        RangeCheck {
            min: da.add_attribute(Attribute::new("VMin", ty, self.min)),
            max: da.add_attribute(Attribute::new("VMax", ty, self.max)),
        }
    }
}

/// Validates against the live `VMin`/`VMax` attributes.
#[derive(Debug, Clone)]
pub(crate) struct RangeCheck {
    min: Arc<Attribute>,
    max: Arc<Attribute>,
}

impl RangeCheck {
    pub(crate) fn contains(&self, v: f64) -> bool {
        self.min.as_float() <= v && v <= self.max.as_float()
    }
}
