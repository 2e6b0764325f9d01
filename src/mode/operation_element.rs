//! Source-only mode used by operation elements with an internal set point
//! (`AnaManInt`, `DIntManInt`, `BinManInt`).
//!
//! There is no operation mode here: the element is always considered active,
//! so source requests are honoured whenever they come through the side
//! `SrcChannel` authorizes. Both source flags start false.

use std::sync::{Arc, Weak};

use crate::attribute::{AttributeMap, Attribute};

use super::source::{Side, SourceMode, SourceSection};

/// Internal/manual source arbitration for one operation element.
#[derive(Debug)]
pub struct SourceModeOperationElement {
    owner: Arc<str>,
    attributes: AttributeMap,
    source: SourceSection,
}

impl SourceModeOperationElement {
    pub fn new(owner: impl Into<Arc<str>>) -> Arc<Self> {
        let owner = owner.into();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let source = SourceSection::new(SourceMode::Manual);
            for (target, side) in [
                (SourceMode::Internal, Side::Aut),
                (SourceMode::Internal, Side::Op),
                (SourceMode::Manual, Side::Aut),
                (SourceMode::Manual, Side::Op),
            ] {
                let weak = weak.clone();
                source.attr(target, side).attach_subscription_callback(
                    move |v| {
                        if let Some(m) = weak.upgrade() {
                            m.source.request(&m.owner, target, side, v.as_bool(), true);
                        }
                    },
                    None,
                );
            }

            let mut attributes = AttributeMap::new();
            source.register(&mut attributes);
            Self {
                owner,
                attributes,
                source,
            }
        })
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.get(name)
    }

    pub fn source(&self) -> Option<SourceMode> {
        self.source.source()
    }

    pub fn is_manual(&self) -> bool {
        self.source() == Some(SourceMode::Manual)
    }

    pub fn is_internal(&self) -> bool {
        self.source() == Some(SourceMode::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_follows_channel() {
        let m = SourceModeOperationElement::new("valve");
        assert_eq!(m.source(), None);

        m.attribute("SrcManOp").unwrap().set_value(true);
        assert!(m.is_manual());
        assert!(!m.attribute("SrcManOp").unwrap().as_bool());

        m.attribute("SrcIntAut").unwrap().set_value(true);
        assert!(m.is_manual(), "Aut side is not authoritative while SrcChannel is false");

        m.attribute("SrcChannel").unwrap().set_value(true);
        m.attribute("SrcIntAut").unwrap().set_value(true);
        assert!(m.is_internal());
    }
}
