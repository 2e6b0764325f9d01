//! Active elements: actuators and controllers owned by the PEA (valves,
//! drives, PID loops). They carry their own operation/source mode with an
//! internal/manual source and whatever attributes the concrete element adds.

use std::sync::Arc;

use crate::attribute::{Attribute, AttributeMap};
use crate::mode::OperationSourceMode;

use super::data_assembly::{DataAssembly, Element, ElementKind};

/// Generic active element.
#[derive(Debug)]
pub struct ActiveElement {
    assembly: DataAssembly,
    op_src_mode: Arc<OperationSourceMode>,
}

impl ActiveElement {
    pub fn new(tag: &str, description: &str) -> Self {
        Self {
            assembly: DataAssembly::new(tag, description, ElementKind::Active),
            op_src_mode: OperationSourceMode::for_active_element(tag),
        }
    }

    /// Adds an element-specific attribute.
    pub fn with_attribute(mut self, attr: Arc<Attribute>) -> Self {
        self.assembly.add_attribute(attr);
        self
    }

    pub fn op_src_mode(&self) -> &Arc<OperationSourceMode> {
        &self.op_src_mode
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.assembly.attribute(name)
    }
}

impl Element for ActiveElement {
    fn assembly(&self) -> &DataAssembly {
        &self.assembly
    }

    fn leaves(&self) -> Vec<(&'static str, &AttributeMap)> {
        vec![("op_src_mode", self.op_src_mode.attributes())]
    }
}
