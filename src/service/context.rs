//! Context passed to [`ServiceLogic`](super::ServiceLogic) handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::assembly::{Element, IndicatorElement, ParameterElement};
use crate::control::{Procedure, State, StateMachine};
use crate::error::StateError;
use crate::runtime::WorkerContext;

/// Worker context plus the service pieces a handler needs.
#[derive(Clone)]
pub struct ServiceContext {
    worker: WorkerContext,
    procedure: Option<Arc<Procedure>>,
    state_machine: Arc<StateMachine>,
}

impl ServiceContext {
    pub(crate) fn new(worker: WorkerContext, state_machine: Arc<StateMachine>) -> Self {
        let procedure = state_machine.procedure_control().current_procedure();
        Self {
            worker,
            procedure,
            state_machine,
        }
    }

    pub fn worker(&self) -> &WorkerContext {
        &self.worker
    }

    pub fn service(&self) -> &str {
        self.worker.service()
    }

    /// State this handler runs for.
    pub fn state(&self) -> State {
        self.worker.state()
    }

    /// Current procedure when the worker was spawned.
    pub fn procedure(&self) -> Option<&Arc<Procedure>> {
        self.procedure.as_ref()
    }

    pub fn report_value(&self, tag: &str) -> Option<&Arc<IndicatorElement>> {
        self.procedure
            .as_ref()?
            .report_values()
            .iter()
            .find(|v| v.tag_name() == tag)
    }

    pub fn procedure_parameter(&self, tag: &str) -> Option<&Arc<ParameterElement>> {
        self.procedure.as_ref()?.procedure_parameter(tag)
    }

    pub fn state_machine(&self) -> &Arc<StateMachine> {
        &self.state_machine
    }

    /// True while the service is in `state` and this worker is current.
    pub fn is_state(&self, state: State) -> bool {
        self.worker.is_current() && self.state_machine.state() == state
    }

    pub fn is_current(&self) -> bool {
        self.worker.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        self.worker.token()
    }

    pub async fn cancelled(&self) {
        self.worker.cancelled().await
    }

    /// Sleeps for `d`; returns `false` if cancelled first.
    pub async fn sleep(&self, d: Duration) -> bool {
        self.worker.sleep(d).await
    }

    pub fn checkpoint(&self) -> Result<(), StateError> {
        self.worker.checkpoint()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("service", &self.service())
            .field("state", &self.state())
            .field("generation", &self.worker.generation())
            .field("procedure", &self.procedure.as_ref().map(|p| p.id()))
            .finish()
    }
}
