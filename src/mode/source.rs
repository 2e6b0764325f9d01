//! Source-mode half shared by both arbitration flavours.

use std::sync::Arc;

use tracing::debug;

use crate::attribute::{Attribute, AttributeMap, DataType};

/// Signal source once a mode other than offline is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceMode {
    /// Set points come from inside the PEA (`SrcIntAct`).
    Internal,
    /// Set points come from the orchestration layer (`SrcExtAct`).
    External,
    /// Set points come from manual input (`SrcManAct`).
    Manual,
}

impl SourceMode {
    pub fn as_label(self) -> &'static str {
        match self {
            SourceMode::Internal => "int",
            SourceMode::External => "ext",
            SourceMode::Manual => "man",
        }
    }
}

/// Which side issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    /// Automation (`*Aut`), authoritative while the channel is true.
    Aut,
    /// Operator (`*Op`), authoritative while the channel is false; self-clearing.
    Op,
}

impl Side {
    pub(crate) fn authorized(self, channel: bool) -> bool {
        match self {
            Side::Aut => channel,
            Side::Op => !channel,
        }
    }
}

/// `SrcChannel`, the four source requests and the two act flags.
#[derive(Debug)]
pub(crate) struct SourceSection {
    pub(crate) alt: SourceMode,
    pub(crate) channel: Arc<Attribute>,
    pub(crate) int_aut: Arc<Attribute>,
    pub(crate) int_op: Arc<Attribute>,
    pub(crate) alt_aut: Arc<Attribute>,
    pub(crate) alt_op: Arc<Attribute>,
    pub(crate) int_act: Arc<Attribute>,
    pub(crate) alt_act: Arc<Attribute>,
}

impl SourceSection {
    /// `alt` is the non-internal source: `External` for services, `Manual` for elements.
    pub(crate) fn new(alt: SourceMode) -> Self {
        let tag = match alt {
            SourceMode::Manual => "Man",
            _ => "Ext",
        };
        let flag = |name: String| Attribute::new(name, DataType::Bool, false);
        Self {
            alt,
            channel: flag("SrcChannel".to_string()),
            alt_aut: flag(format!("Src{tag}Aut")),
            int_op: flag("SrcIntOp".to_string()),
            int_aut: flag("SrcIntAut".to_string()),
            alt_op: flag(format!("Src{tag}Op")),
            int_act: flag("SrcIntAct".to_string()),
            alt_act: flag(format!("Src{tag}Act")),
        }
    }

    pub(crate) fn register(&self, map: &mut AttributeMap) {
        for a in [
            &self.channel,
            &self.alt_aut,
            &self.int_op,
            &self.int_aut,
            &self.alt_op,
            &self.int_act,
            &self.alt_act,
        ] {
            map.insert(Arc::clone(a));
        }
    }

    pub(crate) fn source(&self) -> Option<SourceMode> {
        if self.int_act.as_bool() {
            Some(SourceMode::Internal)
        } else if self.alt_act.as_bool() {
            Some(self.alt)
        } else {
            None
        }
    }

    /// Forces the act flags; `None` clears both.
    pub(crate) fn switch(&self, owner: &str, to: Option<SourceMode>) {
        let internal = to == Some(SourceMode::Internal);
        let alt = to.is_some() && !internal;
        self.int_act.set_value(internal);
        self.alt_act.set_value(alt);
        debug!(
            owner,
            source = to.map_or("off", SourceMode::as_label),
            "source mode switched"
        );
    }

    /// Arbitrates one source request. `active` is false while the owner is offline.
    ///
    /// Returns `true` if the request attribute must be mirrored.
    pub(crate) fn request(
        &self,
        owner: &str,
        target: SourceMode,
        side: Side,
        value: bool,
        active: bool,
    ) -> bool {
        let authorized = side.authorized(self.channel.as_bool());
        if value && active && authorized && self.source() != Some(target) {
            self.switch(owner, Some(target));
        } else if value {
            debug!(owner, target = target.as_label(), ?side, "source request ignored");
        }
        match side {
            Side::Aut => true,
            Side::Op if value => {
                self.attr(target, side).set_value(false);
                true
            }
            Side::Op => false,
        }
    }

    pub(crate) fn attr(&self, target: SourceMode, side: Side) -> &Arc<Attribute> {
        match (target, side) {
            (SourceMode::Internal, Side::Aut) => &self.int_aut,
            (SourceMode::Internal, Side::Op) => &self.int_op,
            (_, Side::Aut) => &self.alt_aut,
            (_, Side::Op) => &self.alt_op,
        }
    }
}
