//! Indicator elements: read-only values a service reports (`AnaView`,
//! `DIntView`, `BinView`, `StringView`).

use std::sync::Arc;

use crate::attribute::{Attribute, DataType, Value};

use super::data_assembly::{DataAssembly, Element, ElementKind};
use super::scale::Scale;

/// Indicator flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    AnaView,
    DIntView,
    BinView,
    StringView,
}

/// Report value / process value out.
#[derive(Debug)]
pub struct IndicatorElement {
    assembly: DataAssembly,
    kind: IndicatorKind,
    v: Arc<Attribute>,
}

impl IndicatorElement {
    pub fn ana_view(tag: &str, description: &str, scale: Scale) -> Arc<Self> {
        Self::scaled(tag, description, IndicatorKind::AnaView, DataType::Float, scale)
    }

    pub fn dint_view(tag: &str, description: &str, scale: Scale) -> Arc<Self> {
        Self::scaled(tag, description, IndicatorKind::DIntView, DataType::Int, scale)
    }

    pub fn bin_view(tag: &str, description: &str, state0: &str, state1: &str) -> Arc<Self> {
        let mut assembly = DataAssembly::new(tag, description, ElementKind::Indicator);
        let v = assembly.add_attribute(Attribute::new("V", DataType::Bool, false));
        assembly.add_attribute(Attribute::new("VState0", DataType::String, state0));
        assembly.add_attribute(Attribute::new("VState1", DataType::String, state1));
        Arc::new(Self {
            assembly,
            kind: IndicatorKind::BinView,
            v,
        })
    }

    pub fn string_view(tag: &str, description: &str) -> Arc<Self> {
        let mut assembly = DataAssembly::new(tag, description, ElementKind::Indicator);
        let v = assembly.add_attribute(Attribute::new("V", DataType::String, ""));
        Arc::new(Self {
            assembly,
            kind: IndicatorKind::StringView,
            v,
        })
    }

    fn scaled(
        tag: &str,
        description: &str,
        kind: IndicatorKind,
        ty: DataType,
        scale: Scale,
    ) -> Arc<Self> {
        let mut assembly = DataAssembly::new(tag, description, ElementKind::Indicator);
        let v = assembly.add_attribute(Attribute::new("V", ty, 0));
        scale.register(&mut assembly, ty);
        Arc::new(Self { assembly, kind, v })
    }

    pub fn kind(&self) -> IndicatorKind {
        self.kind
    }

    pub fn set_v(&self, v: impl Into<Value>) {
        self.v.set_value(v);
    }

    pub fn v(&self) -> Value {
        self.v.value()
    }
}

impl Element for IndicatorElement {
    fn assembly(&self) -> &DataAssembly {
        &self.assembly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_coerce_into_their_type() {
        let dint = IndicatorElement::dint_view("count", "", Scale::default());
        dint.set_v(41.7);
        assert_eq!(dint.v(), Value::Int(41));

        let bin = IndicatorElement::bin_view("flag", "", "no", "yes");
        bin.set_v(1);
        assert_eq!(bin.v(), Value::Bool(true));
        assert_eq!(
            bin.assembly().attribute("VState1").map(|a| a.as_string()).as_deref(),
            Some("yes")
        );
    }

    #[test]
    fn test_scaled_view_attributes() {
        let ana = IndicatorElement::ana_view("temp", "", Scale::new(0.0, 10.0, 1001));
        let names: Vec<_> = ana.assembly().attributes().names().collect();
        assert_eq!(
            names,
            vec![
                "tag_name",
                "tag_description",
                "OSLevel",
                "WQC",
                "V",
                "VSclMin",
                "VSclMax",
                "VUnit"
            ]
        );
        assert_eq!(ana.kind(), IndicatorKind::AnaView);
    }
}
