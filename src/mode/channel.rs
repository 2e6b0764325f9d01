use super::op_src_mode::{OperationMode, OperationSourceMode};
use super::source::SourceMode;

/// Which of the `*Op` / `*Int` / `*Ext` request attributes a write came in on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestChannel {
    Op,
    Int,
    Ext,
}

impl RequestChannel {
    /// Channel the mode currently listens to, `None` while offline.
    pub(crate) fn authoritative(mode: &OperationSourceMode) -> Option<RequestChannel> {
        match (mode.mode(), mode.source()) {
            (OperationMode::Operator, _) => Some(RequestChannel::Op),
            (OperationMode::Automatic, Some(SourceMode::Internal)) => Some(RequestChannel::Int),
            (OperationMode::Automatic, Some(SourceMode::External)) => Some(RequestChannel::Ext),
            _ => None,
        }
    }

    pub(crate) fn authorized(self, mode: &OperationSourceMode) -> bool {
        Self::authoritative(mode) == Some(self)
    }

    pub(crate) fn as_label(self) -> &'static str {
        match self {
            RequestChannel::Op => "op",
            RequestChannel::Int => "int",
            RequestChannel::Ext => "ext",
        }
    }
}
