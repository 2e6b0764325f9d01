//! Operation elements: manually operated set points (`AnaMan`, `DIntMan`,
//! `BinMan`) and their variants with an internal set point and source mode
//! (`AnaManInt`, `DIntManInt`, `BinManInt`).
//!
//! A valid `VMan` (or, for `*ManInt`, a `VInt` while the source is internal)
//! drives `VOut`, `VRbk` and `VFbk`. `*ManInt` only accepts `VMan` while the
//! source is manual.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::attribute::{Attribute, AttributeMap, DataType, Value};
use crate::mode::{SourceMode, SourceModeOperationElement};

use super::data_assembly::{DataAssembly, Element, ElementKind};
use super::scale::{Limits, RangeCheck, Scale};

/// Operation element flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    AnaMan,
    AnaManInt,
    DIntMan,
    DIntManInt,
    BinMan,
    BinManInt,
}

impl OperationKind {
    fn has_internal(self) -> bool {
        matches!(
            self,
            OperationKind::AnaManInt | OperationKind::DIntManInt | OperationKind::BinManInt
        )
    }
}

#[derive(Debug)]
struct Outputs {
    v_out: Arc<Attribute>,
    v_rbk: Arc<Attribute>,
    v_fbk: Arc<Attribute>,
}

impl Outputs {
    fn set(&self, v: &Value) {
        self.v_out.set_value(v.clone());
        self.v_rbk.set_value(v.clone());
        self.v_fbk.set_value(v.clone());
    }
}

/// Manually operated set point.
#[derive(Debug)]
pub struct OperationElement {
    assembly: DataAssembly,
    kind: OperationKind,
    source: Option<Arc<SourceModeOperationElement>>,
    outputs: Arc<Outputs>,
}

impl OperationElement {
    pub fn ana_man(
        tag: &str,
        description: &str,
        limits: Limits,
        scale: Scale,
        init: f64,
    ) -> Arc<Self> {
        let init = Value::Float(init);
        let kind = OperationKind::AnaMan;
        Self::analog(tag, description, kind, DataType::Float, limits, scale, init)
    }

    pub fn ana_man_int(
        tag: &str,
        description: &str,
        limits: Limits,
        scale: Scale,
        init: f64,
    ) -> Arc<Self> {
        let init = Value::Float(init);
        let kind = OperationKind::AnaManInt;
        Self::analog(tag, description, kind, DataType::Float, limits, scale, init)
    }

    pub fn dint_man(
        tag: &str,
        description: &str,
        limits: Limits,
        scale: Scale,
        init: i64,
    ) -> Arc<Self> {
        let init = Value::Int(init);
        let kind = OperationKind::DIntMan;
        Self::analog(tag, description, kind, DataType::Int, limits, scale, init)
    }

    pub fn dint_man_int(
        tag: &str,
        description: &str,
        limits: Limits,
        scale: Scale,
        init: i64,
    ) -> Arc<Self> {
        let init = Value::Int(init);
        let kind = OperationKind::DIntManInt;
        Self::analog(tag, description, kind, DataType::Int, limits, scale, init)
    }

    pub fn bin_man(
        tag: &str,
        description: &str,
        state0: &str,
        state1: &str,
        init: bool,
    ) -> Arc<Self> {
        Self::binary(tag, description, OperationKind::BinMan, state0, state1, init)
    }

    pub fn bin_man_int(
        tag: &str,
        description: &str,
        state0: &str,
        state1: &str,
        init: bool,
    ) -> Arc<Self> {
        Self::binary(tag, description, OperationKind::BinManInt, state0, state1, init)
    }

    fn analog(
        tag: &str,
        description: &str,
        kind: OperationKind,
        ty: DataType,
        limits: Limits,
        scale: Scale,
        init: Value,
    ) -> Arc<Self> {
        let mut da = DataAssembly::new(tag, description, ElementKind::Operation);
        let v_out = da.add_attribute(Attribute::new("VOut", ty, init.clone()));
        scale.register(&mut da, ty);
        let v_man = da.add_attribute(Attribute::new("VMan", ty, init.clone()));
        let range = limits.register(&mut da, ty);
        let v_rbk = da.add_attribute(Attribute::new("VRbk", ty, init.clone()));
        let v_fbk = da.add_attribute(Attribute::new("VFbk", ty, init.clone()));
        Self::finish(da, kind, ty, init, v_man, Some(range), Outputs { v_out, v_rbk, v_fbk })
    }

    fn binary(
        tag: &str,
        description: &str,
        kind: OperationKind,
        state0: &str,
        state1: &str,
        init: bool,
    ) -> Arc<Self> {
        let ty = DataType::Bool;
        let mut da = DataAssembly::new(tag, description, ElementKind::Operation);
        let v_out = da.add_attribute(Attribute::new("VOut", ty, init));
        da.add_attribute(Attribute::new("VState0", DataType::String, state0));
        da.add_attribute(Attribute::new("VState1", DataType::String, state1));
        let v_man = da.add_attribute(Attribute::new("VMan", ty, init));
        let v_rbk = da.add_attribute(Attribute::new("VRbk", ty, init));
        let v_fbk = da.add_attribute(Attribute::new("VFbk", ty, init));
        Self::finish(da, kind, ty, Value::Bool(init), v_man, None, Outputs { v_out, v_rbk, v_fbk })
    }

    fn finish(
        mut da: DataAssembly,
        kind: OperationKind,
        ty: DataType,
        init: Value,
        v_man: Arc<Attribute>,
        range: Option<RangeCheck>,
        outputs: Outputs,
    ) -> Arc<Self> {
        let outputs = Arc::new(outputs);
        let tag: Arc<str> = da.tag_name().into();

        let source = kind.has_internal().then(|| {
            da.add_attribute(Attribute::new("WQC", DataType::Int, 0));
            let v_int = da.add_attribute(Attribute::new("VInt", ty, init));
            let source = SourceModeOperationElement::new(tag.clone());
            attach(&v_int, &tag, SourceMode::Internal, Some(&source), range.clone(), &outputs);
            source
        });
        attach(&v_man, &tag, SourceMode::Manual, source.as_ref(), range, &outputs);

        Arc::new(Self {
            assembly: da,
            kind,
            source,
            outputs,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Source arbitration of `*ManInt` elements.
    pub fn source_mode(&self) -> Option<&Arc<SourceModeOperationElement>> {
        self.source.as_ref()
    }

    /// Drives `VOut`, `VRbk` and `VFbk` directly.
    pub fn set_v_out(&self, v: impl Into<Value>) {
        self.outputs.set(&v.into());
    }

    pub fn v_out(&self) -> Value {
        self.outputs.v_out.value()
    }

    pub fn set_v_fbk(&self, v: impl Into<Value>) {
        self.outputs.v_fbk.set_value(v);
    }
}

/// Wires one set point input. `source` gates the input when present.
fn attach(
    input: &Arc<Attribute>,
    tag: &Arc<str>,
    required: SourceMode,
    source: Option<&Arc<SourceModeOperationElement>>,
    range: Option<RangeCheck>,
    outputs: &Arc<Outputs>,
) {
    let tag = tag.clone();
    let source = source.map(Arc::downgrade);
    let outputs = Arc::downgrade(outputs);
    input.attach_subscription_callback(
        move |v| {
            if let Some(source) = &source {
                let active = source.upgrade().and_then(|s| s.source());
                if active != Some(required) {
                    debug!(
                        element = %tag,
                        input = required.as_label(),
                        "set point ignored: source not active"
                    );
                    return;
                }
            }
            if let Some(range) = &range {
                if !range.contains(v.as_float()) {
                    warn!(element = %tag, value = %v, "set point out of range");
                    return;
                }
            }
            if let Some(outputs) = outputs.upgrade() {
                outputs.set(v);
            }
        },
        None,
    );
}

impl Element for OperationElement {
    fn assembly(&self) -> &DataAssembly {
        &self.assembly
    }

    fn leaves(&self) -> Vec<(&'static str, &AttributeMap)> {
        match &self.source {
            Some(source) => vec![("op_src_mode", source.attributes())],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(e: &OperationElement, name: &str) -> Arc<Attribute> {
        e.assembly().attribute(name).expect(name).clone()
    }

    #[test]
    fn test_man_drives_outputs_within_limits() {
        let limits = Limits::new(0.0, 10.0);
        let e = OperationElement::ana_man("valve", "", limits, Scale::default(), 0.0);
        attr(&e, "VMan").set_value(7.5);
        assert_eq!(e.v_out(), Value::Float(7.5));
        assert_eq!(attr(&e, "VRbk").value(), Value::Float(7.5));
        attr(&e, "VMan").set_value(11.0);
        assert_eq!(e.v_out(), Value::Float(7.5));
    }

    #[test]
    fn test_man_int_follows_source() {
        let e = OperationElement::dint_man_int("pump", "", Limits::default(), Scale::default(), 0);
        let src = e.source_mode().expect("source mode").clone();

        attr(&e, "VMan").set_value(5);
        attr(&e, "VInt").set_value(6);
        assert_eq!(e.v_out(), Value::Int(0), "no source active yet");

        src.attribute("SrcManOp").expect("SrcManOp").set_value(true);
        attr(&e, "VMan").set_value(5);
        attr(&e, "VInt").set_value(6);
        assert_eq!(e.v_out(), Value::Int(5));

        src.attribute("SrcIntOp").expect("SrcIntOp").set_value(true);
        attr(&e, "VInt").set_value(6);
        assert_eq!(e.v_out(), Value::Int(6));
        assert_eq!(attr(&e, "WQC").as_int(), 0);
    }

    #[test]
    fn test_bin_man_has_no_range() {
        let e = OperationElement::bin_man("heater", "", "off", "on", false);
        attr(&e, "VMan").set_value(true);
        assert_eq!(attr(&e, "VFbk").value(), Value::Bool(true));
        assert!(e.leaves().is_empty());
    }
}
