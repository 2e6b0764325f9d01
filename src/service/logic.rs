//! # User business logic of a service.
//!
//! A service implements [`ServiceLogic`]: one async handler per lifecycle
//! state. Only `starting`, `execute` and `completing` are required; the rest
//! fall back along a delegation chain so a small service still behaves
//! sensibly when the optional loops are enabled:
//!
//! ```text
//! stopping ─► holding ─► pausing ─► completing
//! aborting ─► stopping
//! aborted  ─► stopped ─► held ─► paused
//! unholding ─► resuming ─► starting
//! idle, completed, paused, resetting: log only
//! ```
//!
//! Returning `Ok(())` lets the service auto-advance (`starting → execute`,
//! `holding → held`, ...). `execute` only advances to `completing` for
//! self-completing procedures. Long-running handlers should poll the
//! [`ServiceContext`] and return `Err(StateError::Canceled)` once superseded.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use mtpvisor::{ServiceContext, ServiceLogic, StateError};
//!
//! struct Counter;
//!
//! #[async_trait::async_trait]
//! impl ServiceLogic for Counter {
//!     async fn starting(&self, _ctx: &ServiceContext) -> Result<(), StateError> {
//!         Ok(())
//!     }
//!
//!     async fn execute(&self, ctx: &ServiceContext) -> Result<(), StateError> {
//!         let mut n = 0;
//!         while n < 100 {
//!             ctx.checkpoint()?;
//!             n += 1;
//!             ctx.sleep(Duration::from_millis(100)).await;
//!         }
//!         Ok(())
//!     }
//!
//!     async fn completing(&self, _ctx: &ServiceContext) -> Result<(), StateError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use tracing::debug;

use super::context::ServiceContext;
use crate::control::State;
use crate::error::StateError;

/// Per-state handlers of a service.
#[async_trait]
pub trait ServiceLogic: Send + Sync + 'static {
    async fn starting(&self, ctx: &ServiceContext) -> Result<(), StateError>;

    async fn execute(&self, ctx: &ServiceContext) -> Result<(), StateError>;

    async fn completing(&self, ctx: &ServiceContext) -> Result<(), StateError>;

    async fn idle(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        log_entry(ctx);
        Ok(())
    }

    async fn completed(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        log_entry(ctx);
        Ok(())
    }

    async fn paused(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        log_entry(ctx);
        Ok(())
    }

    async fn resetting(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        log_entry(ctx);
        Ok(())
    }

    async fn pausing(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.completing(ctx).await
    }

    async fn holding(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.pausing(ctx).await
    }

    async fn stopping(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.holding(ctx).await
    }

    async fn aborting(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.stopping(ctx).await
    }

    async fn resuming(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.starting(ctx).await
    }

    async fn unholding(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.resuming(ctx).await
    }

    async fn held(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.paused(ctx).await
    }

    async fn stopped(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.held(ctx).await
    }

    async fn aborted(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.stopped(ctx).await
    }
}

fn log_entry(ctx: &ServiceContext) {
    debug!(service = %ctx.service(), state = %ctx.state(), "state entered");
}

/// Calls the handler for `state`.
pub(crate) async fn dispatch(
    logic: &dyn ServiceLogic,
    state: State,
    ctx: &ServiceContext,
) -> Result<(), StateError> {
    match state {
        State::Stopped => logic.stopped(ctx).await,
        State::Starting => logic.starting(ctx).await,
        State::Idle => logic.idle(ctx).await,
        State::Paused => logic.paused(ctx).await,
        State::Execute => logic.execute(ctx).await,
        State::Stopping => logic.stopping(ctx).await,
        State::Aborting => logic.aborting(ctx).await,
        State::Aborted => logic.aborted(ctx).await,
        State::Holding => logic.holding(ctx).await,
        State::Held => logic.held(ctx).await,
        State::Unholding => logic.unholding(ctx).await,
        State::Pausing => logic.pausing(ctx).await,
        State::Resuming => logic.resuming(ctx).await,
        State::Resetting => logic.resetting(ctx).await,
        State::Completing => logic.completing(ctx).await,
        State::Completed => logic.completed(ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::control::{ProcedureControl, StateMachine};
    use crate::events::Bus;
    use crate::mode::OperationSourceMode;
    use crate::runtime::WorkerContext;

    /// Records which handler ran for which state.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(&'static str, State)>>,
        own_holding: bool,
        own_paused: bool,
    }

    impl Recorder {
        fn record(&self, handler: &'static str, ctx: &ServiceContext) {
            self.calls.lock().push((handler, ctx.state()));
        }

        fn take(&self) -> Vec<(&'static str, State)> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    #[async_trait]
    impl ServiceLogic for Recorder {
        async fn starting(&self, ctx: &ServiceContext) -> Result<(), StateError> {
            self.record("starting", ctx);
            Ok(())
        }

        async fn execute(&self, ctx: &ServiceContext) -> Result<(), StateError> {
            self.record("execute", ctx);
            Ok(())
        }

        async fn completing(&self, ctx: &ServiceContext) -> Result<(), StateError> {
            self.record("completing", ctx);
            Ok(())
        }

        async fn holding(&self, ctx: &ServiceContext) -> Result<(), StateError> {
            if self.own_holding {
                self.record("holding", ctx);
                return Ok(());
            }
            self.pausing(ctx).await
        }

        async fn paused(&self, ctx: &ServiceContext) -> Result<(), StateError> {
            if self.own_paused {
                self.record("paused", ctx);
            }
            Ok(())
        }
    }

    fn ctx(state: State) -> ServiceContext {
        let mode = OperationSourceMode::new("svc");
        let pc = ProcedureControl::new("svc", mode.clone());
        let sm = StateMachine::new("svc", mode, pc, Bus::new(8));
        let worker = WorkerContext::new(
            Arc::from("svc"),
            state,
            1,
            CancellationToken::new(),
            Arc::new(AtomicU64::new(1)),
        );
        ServiceContext::new(worker, sm)
    }

    async fn run(logic: &Recorder, state: State) -> Vec<(&'static str, State)> {
        dispatch(logic, state, &ctx(state)).await.unwrap();
        logic.take()
    }

    #[tokio::test]
    async fn test_transitional_handlers_fall_back_to_completing() {
        let logic = Recorder::default();
        for state in [State::Aborting, State::Stopping, State::Holding, State::Pausing] {
            assert_eq!(run(&logic, state).await, vec![("completing", state)]);
        }
        for state in [State::Unholding, State::Resuming] {
            assert_eq!(run(&logic, state).await, vec![("starting", state)]);
        }
    }

    #[tokio::test]
    async fn test_resting_handlers_fall_back_to_paused() {
        let logic = Recorder {
            own_paused: true,
            ..Recorder::default()
        };
        for state in [State::Aborted, State::Stopped, State::Held, State::Paused] {
            assert_eq!(run(&logic, state).await, vec![("paused", state)]);
        }
        assert!(run(&logic, State::Idle).await.is_empty());
        assert!(run(&logic, State::Completed).await.is_empty());
    }

    #[tokio::test]
    async fn test_override_cuts_the_chain() {
        let logic = Recorder {
            own_holding: true,
            ..Recorder::default()
        };
        assert_eq!(run(&logic, State::Aborting).await, vec![("holding", State::Aborting)]);
        assert_eq!(run(&logic, State::Pausing).await, vec![("completing", State::Pausing)]);
    }
}
