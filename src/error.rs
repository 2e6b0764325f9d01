//! Error types used by services, workers and procedure selection.
//!
//! This module defines three error enums:
//!
//! - [`ServiceError`] — construction and programming errors raised while a
//!   service or PEA is being assembled.
//! - [`StateError`] — outcome of a worker running a lifecycle-state handler.
//! - [`ProcedureError`] — procedure selection failures on `start`.
//!
//! Rejected commands, coercion failures and mode-arbitration violations are
//! not errors: they are logged and dropped where they happen.
//!
//! All types provide `as_label` / `as_message` helpers for logs and metrics.

use thiserror::Error;

use crate::control::State;

/// # Errors raised while building services and PEAs.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Procedure ids must be strictly positive.
    #[error("procedure '{tag}': id {id} must be greater than 0")]
    InvalidProcedureId {
        /// Tag name of the rejected procedure.
        tag: String,
        /// Rejected id.
        id: i64,
    },

    /// No tokio runtime handle was supplied and none is current.
    #[error("no tokio runtime available to spawn state workers")]
    NoRuntime,

    /// The element kind cannot be attached at this place.
    #[error("unsupported element: {what}")]
    UnsupportedElement {
        /// What was attempted.
        what: String,
    },

    /// A service (or active element) with the same tag is already registered.
    #[error("duplicate tag '{tag}'")]
    DuplicateService {
        /// Offending tag name.
        tag: String,
    },
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use mtpvisor::ServiceError;
    ///
    /// let err = ServiceError::NoRuntime;
    /// assert_eq!(err.as_label(), "service_no_runtime");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::InvalidProcedureId { .. } => "service_invalid_procedure_id",
            ServiceError::NoRuntime => "service_no_runtime",
            ServiceError::UnsupportedElement { .. } => "service_unsupported_element",
            ServiceError::DuplicateService { .. } => "service_duplicate",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ServiceError::InvalidProcedureId { tag, id } => {
                format!("invalid procedure id {id} for '{tag}'")
            }
            ServiceError::NoRuntime => "no runtime".to_string(),
            ServiceError::UnsupportedElement { what } => format!("unsupported: {what}"),
            ServiceError::DuplicateService { tag } => format!("duplicate: {tag}"),
        }
    }
}

/// # Outcome of a lifecycle-state handler.
///
/// `Canceled` is a graceful exit: the handler observed that its worker was
/// superseded and returned early. Everything else is routed to the service's
/// exception handler.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Handler observed cancellation and stopped cooperatively.
    #[error("worker cancelled")]
    Canceled,

    /// Recoverable failure (handlers typically drive the service to `holding`).
    #[error("state handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Unrecoverable failure (handlers typically drive the service to `aborting`).
    #[error("fatal state handler error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked; the panic was caught by the worker.
    #[error("state handler panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },
}

impl StateError {
    /// Shorthand for [`StateError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        StateError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`StateError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        StateError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use mtpvisor::StateError;
    ///
    /// assert_eq!(StateError::Canceled.as_label(), "state_canceled");
    /// assert_eq!(StateError::fail("sensor lost").as_label(), "state_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::Canceled => "state_canceled",
            StateError::Fail { .. } => "state_failed",
            StateError::Fatal { .. } => "state_fatal",
            StateError::Panicked { .. } => "state_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StateError::Canceled => "worker cancelled".to_string(),
            StateError::Fail { error } => format!("error: {error}"),
            StateError::Fatal { error } => format!("fatal: {error}"),
            StateError::Panicked { info } => format!("panic: {info}"),
        }
    }

    /// True for the graceful cancellation exit.
    pub fn is_canceled(&self) -> bool {
        matches!(self, StateError::Canceled)
    }

    /// True for errors a handler should treat as unrecoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StateError::Fatal { .. } | StateError::Panicked { .. })
    }
}

/// # Procedure selection failures.
///
/// Returned by `set_procedure_cur`; `start` keeps the service in `idle` when
/// one of these occurs.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcedureError {
    /// Current procedure can only change while the service is idle.
    #[error("procedure can only be selected in idle (current state: {state})")]
    NotIdle {
        /// State the service was in.
        state: State,
    },

    /// No procedure was requested and no default is registered.
    #[error("no procedure requested and no default procedure registered")]
    NoProcedure,

    /// Requested id is not registered with the service.
    #[error("unknown procedure id {0}")]
    Unknown(i64),
}

impl ProcedureError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcedureError::NotIdle { .. } => "procedure_not_idle",
            ProcedureError::NoProcedure => "procedure_missing",
            ProcedureError::Unknown(_) => "procedure_unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceled_is_graceful() {
        assert!(StateError::Canceled.is_canceled());
        assert!(!StateError::fail("x").is_canceled());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(StateError::fatal("x").is_fatal());
        assert!(StateError::Panicked { info: "p".into() }.is_fatal());
        assert!(!StateError::fail("x").is_fatal());
    }

    #[test]
    fn test_display_carries_details() {
        let err = ServiceError::InvalidProcedureId {
            tag: "cont".into(),
            id: 0,
        };
        assert_eq!(err.to_string(), "procedure 'cont': id 0 must be greater than 0");
        assert_eq!(
            ProcedureError::NotIdle {
                state: State::Execute
            }
            .to_string(),
            "procedure can only be selected in idle (current state: execute)"
        );
    }
}
