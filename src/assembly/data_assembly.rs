//! # Flat data assembly with a capability tag.
//!
//! Every element of a PEA is a [`DataAssembly`]: a tag name, a description,
//! an [`ElementKind`] and an ordered attribute map. The kind decides which
//! standard attributes the assembly starts with:
//!
//! ```text
//! kind            OSLevel  WQC  PosTextID  InteractQuestionID  InteractAnswerID
//! Indicator          x     255
//! Operation          x
//! Parameter          x     255
//! Active             x     255
//! ServiceControl     x     255      x              x                  x
//! Diagnostic               255
//! ```
//!
//! Element types (indicators, parameters, ...) wrap an assembly and add their
//! own attributes; bindings only ever look at the assembly and the
//! [`Element::leaves`] an element exposes.

use std::sync::Arc;

use crate::attribute::{Attribute, AttributeMap, DataType};

/// Capability tag of a data assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Indicator,
    Operation,
    Parameter,
    Active,
    ServiceControl,
    Diagnostic,
}

impl ElementKind {
    pub fn as_label(self) -> &'static str {
        match self {
            ElementKind::Indicator => "indicator",
            ElementKind::Operation => "operation",
            ElementKind::Parameter => "parameter",
            ElementKind::Active => "active",
            ElementKind::ServiceControl => "service_control",
            ElementKind::Diagnostic => "diagnostic",
        }
    }
}

/// Tag, description, kind and attributes of one element.
#[derive(Debug, Clone)]
pub struct DataAssembly {
    tag_name: Arc<str>,
    tag_description: Arc<str>,
    kind: ElementKind,
    attributes: AttributeMap,
}

impl DataAssembly {
    pub fn new(
        tag_name: impl Into<Arc<str>>,
        tag_description: impl Into<Arc<str>>,
        kind: ElementKind,
    ) -> Self {
        let tag_name = tag_name.into();
        let tag_description = tag_description.into();

        let mut attributes = AttributeMap::new();
        attributes.insert(Attribute::new("tag_name", DataType::String, &*tag_name));
        attributes.insert(Attribute::new(
            "tag_description",
            DataType::String,
            &*tag_description,
        ));

        let int = |name: &str, init: i64| Attribute::new(name, DataType::Int, init);
        if kind != ElementKind::Diagnostic {
            attributes.insert(int("OSLevel", 0));
        }
        if kind != ElementKind::Operation {
            attributes.insert(int("WQC", 255));
        }
        if kind == ElementKind::ServiceControl {
            attributes.insert(int("PosTextID", 0));
            attributes.insert(int("InteractQuestionID", 0));
            attributes.insert(int("InteractAnswerID", 0));
        }

        Self {
            tag_name,
            tag_description,
            kind,
            attributes,
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn tag_description(&self) -> &str {
        &self.tag_description
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.get(name)
    }

    /// Adds (or replaces) an attribute and returns a handle to it.
    pub fn add_attribute(&mut self, attr: Arc<Attribute>) -> Arc<Attribute> {
        self.attributes.insert(attr)
    }
}

/// Anything a binding can enumerate: an assembly plus named attribute groups.
pub trait Element: Send + Sync + 'static {
    fn assembly(&self) -> &DataAssembly;

    /// Named attribute groups enumerated after the assembly's own attributes
    /// (for example `op_src_mode`).
    fn leaves(&self) -> Vec<(&'static str, &AttributeMap)> {
        Vec::new()
    }

    fn tag_name(&self) -> &str {
        self.assembly().tag_name()
    }
}
