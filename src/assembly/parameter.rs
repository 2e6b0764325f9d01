//! # Service parameters (`AnaServParam`, `DIntServParam`, `BinServParam`,
//! `StringServParam`).
//!
//! A parameter owns an [`OperationSourceMode`]. Requests arrive on three
//! attributes and only the one the mode authorizes is accepted:
//!
//! ```text
//! VOp  ── mode = operator ──────────────┐
//! VInt ── mode = automatic, src = int ──┼─► in [VMin, VMax]? ─► VReq
//! VExt ── mode = automatic, src = ext ──┘
//!
//! set_v_out():  VReq ─► VOut, VFbk
//! ```
//!
//! Procedure parameters are applied on `start`, configuration parameters when
//! the service leaves offline.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::attribute::{Attribute, AttributeMap, DataType, Value};
use crate::mode::{OperationSourceMode, RequestChannel};

use super::data_assembly::{DataAssembly, Element, ElementKind};
use super::scale::{Limits, RangeCheck, Scale};

/// Parameter flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    AnaServParam,
    DIntServParam,
    BinServParam,
    StringServParam,
}

/// Procedure or configuration parameter.
#[derive(Debug)]
pub struct ParameterElement {
    assembly: DataAssembly,
    kind: ParameterKind,
    op_src_mode: Arc<OperationSourceMode>,
    v_req: Arc<Attribute>,
    v_out: Arc<Attribute>,
    v_fbk: Arc<Attribute>,
}

impl ParameterElement {
    pub fn ana(
        tag: &str,
        description: &str,
        limits: Limits,
        scale: Scale,
        init: f64,
    ) -> Arc<Self> {
        Self::build(
            tag,
            description,
            ParameterKind::AnaServParam,
            DataType::Float,
            Value::Float(init),
            |da, ty| {
                scale.register(da, ty);
                Some(limits.register(da, ty))
            },
        )
    }

    pub fn dint(
        tag: &str,
        description: &str,
        limits: Limits,
        scale: Scale,
        init: i64,
    ) -> Arc<Self> {
        Self::build(
            tag,
            description,
            ParameterKind::DIntServParam,
            DataType::Int,
            Value::Int(init),
            |da, ty| {
                scale.register(da, ty);
                Some(limits.register(da, ty))
            },
        )
    }

    pub fn bin(tag: &str, description: &str, state0: &str, state1: &str, init: bool) -> Arc<Self> {
        Self::build(
            tag,
            description,
            ParameterKind::BinServParam,
            DataType::Bool,
            Value::Bool(init),
            |da, _| {
                da.add_attribute(Attribute::new("VState0", DataType::String, state0));
                da.add_attribute(Attribute::new("VState1", DataType::String, state1));
                None
            },
        )
    }

    pub fn string(tag: &str, description: &str, init: &str) -> Arc<Self> {
        Self::build(
            tag,
            description,
            ParameterKind::StringServParam,
            DataType::String,
            Value::from(init),
            |_, _| None,
        )
    }

    fn build(
        tag: &str,
        description: &str,
        kind: ParameterKind,
        ty: DataType,
        init: Value,
        extra: impl FnOnce(&mut DataAssembly, DataType) -> Option<RangeCheck>,
    ) -> Arc<Self> {
        let mut assembly = DataAssembly::new(tag, description, ElementKind::Parameter);
        let op_src_mode = OperationSourceMode::new(tag);

        let v_op = assembly.add_attribute(Attribute::new("VOp", ty, init.clone()));
        let v_int = assembly.add_attribute(Attribute::new("VInt", ty, init.clone()));
        let v_ext = assembly.add_attribute(Attribute::new("VExt", ty, init.clone()));
        let v_req = assembly.add_attribute(Attribute::new("VReq", ty, init.clone()));
        let v_out = assembly.add_attribute(Attribute::new("VOut", ty, init.clone()));
        let v_fbk = assembly.add_attribute(Attribute::new("VFbk", ty, init));
        let range = extra(&mut assembly, ty);

        for (attr, channel) in [
            (&v_op, RequestChannel::Op),
            (&v_int, RequestChannel::Int),
            (&v_ext, RequestChannel::Ext),
        ] {
            let mode = Arc::downgrade(&op_src_mode);
            let v_req = Arc::downgrade(&v_req);
            let range = range.clone();
            let tag: Arc<str> = tag.into();
            attr.attach_subscription_callback(
                move |v| {
                    let (Some(mode), Some(v_req)) = (mode.upgrade(), v_req.upgrade()) else {
                        return;
                    };
                    if !channel.authorized(&mode) {
                        debug!(
                            parameter = %tag,
                            channel = channel.as_label(),
                            "parameter request not authorized"
                        );
                        return;
                    }
                    if let Some(range) = &range {
                        if !range.contains(v.as_float()) {
                            warn!(parameter = %tag, value = %v, "parameter request out of range");
                            return;
                        }
                    }
                    v_req.set_value(v.clone());
                },
                None,
            );
        }

        Arc::new(Self {
            assembly,
            kind,
            op_src_mode,
            v_req,
            v_out,
            v_fbk,
        })
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn op_src_mode(&self) -> &Arc<OperationSourceMode> {
        &self.op_src_mode
    }

    /// Copies `VReq` into `VOut` and `VFbk`.
    pub fn set_v_out(&self) {
        let v = self.v_req.value();
        debug!(parameter = %self.assembly.tag_name(), value = %v, "parameter applied");
        self.v_out.set_value(v.clone());
        self.v_fbk.set_value(v);
    }

    pub fn v_out(&self) -> Value {
        self.v_out.value()
    }

    pub fn v_req(&self) -> Value {
        self.v_req.value()
    }

    pub fn set_v_fbk(&self, v: impl Into<Value>) {
        self.v_fbk.set_value(v);
    }

    /// Writes the internal request (`VInt`), as PEA-side logic would.
    pub fn set_v_int(&self, v: impl Into<Value>) {
        if let Some(a) = self.assembly.attribute("VInt") {
            a.set_value(v);
        }
    }
}

impl Element for ParameterElement {
    fn assembly(&self) -> &DataAssembly {
        &self.assembly
    }

    fn leaves(&self) -> Vec<(&'static str, &AttributeMap)> {
        vec![("op_src_mode", self.op_src_mode.attributes())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator(p: &ParameterElement) {
        p.op_src_mode()
            .attribute("StateOpOp")
            .expect("StateOpOp")
            .set_value(true);
    }

    #[test]
    fn test_requests_need_authorized_channel() {
        let p = ParameterElement::dint("lower", "", Limits::new(0.0, 100.0), Scale::default(), 5);
        let v_op = p.assembly().attribute("VOp").expect("VOp").clone();

        v_op.set_value(10);
        assert_eq!(p.v_req(), Value::Int(5), "offline: rejected");

        operator(&p);
        v_op.set_value(10);
        assert_eq!(p.v_req(), Value::Int(10));

        p.set_v_int(20);
        assert_eq!(p.v_req(), Value::Int(10), "VInt only in automatic/internal");
    }

    #[test]
    fn test_out_of_range_request_is_dropped() {
        let p = ParameterElement::ana("flow", "", Limits::new(0.0, 50.0), Scale::default(), 1.0);
        operator(&p);
        let v_op = p.assembly().attribute("VOp").expect("VOp").clone();
        v_op.set_value(75.0);
        assert_eq!(p.v_req(), Value::Float(1.0));
        v_op.set_value(50.0);
        assert_eq!(p.v_req(), Value::Float(50.0));
    }

    #[test]
    fn test_set_v_out_copies_request() {
        let p = ParameterElement::string("recipe", "", "a");
        operator(&p);
        p.assembly().attribute("VOp").expect("VOp").set_value("b");
        assert_eq!(p.v_out(), Value::from("a"));
        p.set_v_out();
        assert_eq!(p.v_out(), Value::from("b"));
        assert_eq!(
            p.assembly().attribute("VFbk").map(|a| a.value()),
            Some(Value::from("b"))
        );
    }

    #[test]
    fn test_internal_request_in_automatic() {
        let p = ParameterElement::bin("heat", "", "off", "on", false);
        p.op_src_mode()
            .attribute("StateAutOp")
            .expect("StateAutOp")
            .set_value(true);
        p.set_v_int(true);
        assert_eq!(p.v_req(), Value::Bool(true));
    }
}
