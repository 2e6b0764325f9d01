//! # Service: mode, procedures, lifecycle and workers wired together.
//!
//! ```text
//!                 ┌──────────── OperationSourceMode ────────────┐
//!                 │ enter Offline: disable commands, cancel worker
//!                 │ exit Offline:  default commands, apply config, idle worker
//!                 │ enter Operator: install no-procedure guard
//!                 │ exit Operator:  remove it
//!                 ▼
//! CommandOp/Int/Ext ─► StateMachine ─► execution routine ─► ThreadControl
//!                          ▲                                      │
//!                          │      worker Ok + current             ▼
//!                          └──────── state_change ◄──── ServiceLogic handler
//!                                     worker error ──► exception handler
//! ```
//!
//! A service starts offline with every command disabled. Switching to
//! offline is only honoured while the service is idle.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::context::ServiceContext;
use super::logic::{dispatch, ServiceLogic};
use crate::assembly::{DataAssembly, Element, ParameterElement};
use crate::attribute::{Attribute, AttributeMap};
use crate::control::{upsert, Command, Procedure, ProcedureControl, State, StateMachine};
use crate::error::StateError;
use crate::events::{Bus, Event};
use crate::mode::{OperationMode, OperationSourceMode};
use crate::runtime::{StateTaskRef, TaskFn, ThreadControl, WorkerContext, WorkerHooks};

/// Receives errors (and panics) of the current state worker.
///
/// Runs under the transition gate, so it may issue commands directly
/// (typically `abort` or `stop`).
pub type ExceptionHandler = Arc<dyn Fn(&StateMachine, &StateError) + Send + Sync>;

pub(super) struct ServiceInner {
    pub(super) tag: Arc<str>,
    pub(super) assembly: DataAssembly,
    pub(super) op_src_mode: Arc<OperationSourceMode>,
    pub(super) procedure_control: Arc<ProcedureControl>,
    pub(super) state_machine: Arc<StateMachine>,
    pub(super) thread_control: Arc<ThreadControl>,
    pub(super) handlers: HashMap<State, StateTaskRef>,
    pub(super) configuration_parameters: RwLock<Vec<Arc<ParameterElement>>>,
    pub(super) bus: Bus,
    pub(super) forwarder: Mutex<Option<JoinHandle<()>>>,
}

/// One MTP service. Cheap to clone; clones share the same service.
#[derive(Clone)]
pub struct Service {
    pub(super) inner: Arc<ServiceInner>,
}

impl ServiceInner {
    /// Execution routine: schedules the worker for `state`.
    fn on_transition(&self, state: State) {
        if self.op_src_mode.mode() == OperationMode::Offline {
            debug!(service = %self.tag, state = %state, "offline; no worker scheduled");
            return;
        }
        if let Some(task) = self.handlers.get(&state) {
            self.thread_control.request_state(state, task.clone());
            self.thread_control.reallocate_running_thread();
        }
        self.op_src_mode
            .allow_switch_to_offline_mode(state == State::Idle);
    }

    fn init_idle_state(&self) {
        self.state_machine
            .with_gate(|| self.on_transition(self.state_machine.state()));
    }

    fn apply_configuration_parameters(&self) {
        for p in self.configuration_parameters.read().iter() {
            p.set_v_out();
        }
    }

    fn mode_changed(&self, mode: OperationMode) {
        info!(service = %self.tag, mode = mode.as_label(), "mode changed");
        self.bus.publish(Event::mode_changed(self.tag.clone(), mode));
    }
}

impl Service {
    /// Finishes construction: execution routine and mode hooks.
    pub(super) fn wire(inner: ServiceInner) -> Self {
        let inner = Arc::new(inner);

        let weak = Arc::downgrade(&inner);
        inner
            .state_machine
            .set_execution_routine(Arc::new(move |state: State| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_transition(state);
                }
            }));

        let mode = &inner.op_src_mode;
        mode.add_enter_callback(
            OperationMode::Offline,
            hook(&inner, |s| {
                s.state_machine.disable_all_commands();
                s.thread_control.cancel_running_thread();
                s.mode_changed(OperationMode::Offline);
            }),
        );
        mode.add_exit_callback(
            OperationMode::Offline,
            hook(&inner, |s| {
                s.state_machine.restore_default_commands();
                s.apply_configuration_parameters();
                s.init_idle_state();
            }),
        );
        mode.add_enter_callback(
            OperationMode::Operator,
            hook(&inner, |s| {
                s.state_machine.install_no_procedure_guard();
                s.mode_changed(OperationMode::Operator);
            }),
        );
        mode.add_exit_callback(
            OperationMode::Operator,
            hook(&inner, |s| s.state_machine.remove_no_procedure_guard()),
        );
        mode.add_enter_callback(
            OperationMode::Automatic,
            hook(&inner, |s| s.mode_changed(OperationMode::Automatic)),
        );

        inner.state_machine.disable_all_commands();
        Self { inner }
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// Registers a procedure. Its parameters follow the service mode.
    pub fn add_procedure(&self, procedure: Procedure) -> Arc<Procedure> {
        for p in procedure.procedure_parameters() {
            self.inner
                .op_src_mode
                .add_linked_op_src_mode(p.op_src_mode().clone());
        }
        let procedure = Arc::new(procedure);
        self.inner.procedure_control.add_procedure(procedure.clone());
        debug!(service = %self.inner.tag, procedure = procedure.id(), "procedure added");
        procedure
    }

    /// Registers (or replaces by tag) a configuration parameter.
    ///
    /// Configuration parameters keep their own mode; they are applied when
    /// the service leaves offline.
    pub fn add_configuration_parameter(&self, parameter: Arc<ParameterElement>) {
        upsert(&mut self.inner.configuration_parameters.write(), parameter);
    }

    pub fn configuration_parameters(&self) -> Vec<Arc<ParameterElement>> {
        self.inner.configuration_parameters.read().clone()
    }

    /// Copies every configuration parameter's request to its output.
    pub fn apply_configuration_parameters(&self) {
        self.inner.apply_configuration_parameters();
    }

    pub fn enable_pause_loop(&self, enabled: bool) {
        self.inner.state_machine.enable_pause_loop(enabled);
    }

    pub fn enable_hold_loop(&self, enabled: bool) {
        self.inner.state_machine.enable_hold_loop(enabled);
    }

    pub fn enable_restart(&self, enabled: bool) {
        self.inner.state_machine.enable_restart(enabled);
    }

    /// Schedules the worker of the current state again (idle after build).
    pub fn init_idle_state(&self) {
        self.inner.init_idle_state();
    }

    pub fn state(&self) -> State {
        self.inner.state_machine.state()
    }

    pub fn is_state(&self, state: State) -> bool {
        self.state() == state
    }

    pub fn mode(&self) -> OperationMode {
        self.inner.op_src_mode.mode()
    }

    /// Runs a command as if it had arrived on the authoritative channel.
    pub fn execute_command(&self, cmd: Command) -> bool {
        self.inner.state_machine.execute_command(cmd)
    }

    /// Advances to the successor state (see [`StateMachine::state_change`]).
    pub fn state_change(&self) -> bool {
        self.inner.state_machine.state_change()
    }

    pub fn procedures(&self) -> Vec<Arc<Procedure>> {
        self.inner.procedure_control.procedures()
    }

    pub fn procedure(&self, id: i64) -> Option<Arc<Procedure>> {
        self.inner.procedure_control.procedure(id)
    }

    pub fn current_procedure(&self) -> Option<Arc<Procedure>> {
        self.inner.procedure_control.current_procedure()
    }

    pub fn op_src_mode(&self) -> &Arc<OperationSourceMode> {
        &self.inner.op_src_mode
    }

    pub fn state_machine(&self) -> &Arc<StateMachine> {
        &self.inner.state_machine
    }

    pub fn procedure_control(&self) -> &Arc<ProcedureControl> {
        &self.inner.procedure_control
    }

    pub fn thread_control(&self) -> &Arc<ThreadControl> {
        &self.inner.thread_control
    }

    pub fn attributes(&self) -> &AttributeMap {
        self.inner.assembly.attributes()
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.inner.assembly.attribute(name)
    }

    pub fn last_exception(&self) -> Option<StateError> {
        self.inner.thread_control.last_exception()
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Receiver of this service's events (and of any service sharing its bus).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Cancels the live worker and every future one, then waits for the
    /// subscriber forwarder to drain.
    pub async fn shutdown(&self) {
        info!(service = %self.inner.tag, "service shutting down");
        self.inner.thread_control.shutdown();
        let forwarder = self.inner.forwarder.lock().take();
        if let Some(h) = forwarder {
            let _ = h.await;
        }
    }
}

impl Element for Service {
    fn assembly(&self) -> &DataAssembly {
        &self.inner.assembly
    }

    fn leaves(&self) -> Vec<(&'static str, &AttributeMap)> {
        vec![
            ("op_src_mode", self.inner.op_src_mode.attributes()),
            ("state_machine", self.inner.state_machine.attributes()),
            ("procedure_control", self.inner.procedure_control.attributes()),
        ]
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("tag", &self.inner.tag)
            .field("mode", &self.mode())
            .field("state", &self.state())
            .finish()
    }
}

fn hook(
    inner: &Arc<ServiceInner>,
    f: impl Fn(&ServiceInner) + Send + Sync + 'static,
) -> impl Fn() + Send + Sync + 'static {
    let weak: Weak<ServiceInner> = Arc::downgrade(inner);
    move || {
        if let Some(inner) = weak.upgrade() {
            f(&inner);
        }
    }
}

/// One task per state, each dispatching to the matching logic handler.
pub(super) fn handler_table(
    logic: Arc<dyn ServiceLogic>,
    state_machine: &Arc<StateMachine>,
) -> HashMap<State, StateTaskRef> {
    State::ALL
        .into_iter()
        .map(|state| {
            let logic = logic.clone();
            let sm = state_machine.clone();
            let task: StateTaskRef = TaskFn::arc(state.name(), move |worker: WorkerContext| {
                let logic = logic.clone();
                let sm = sm.clone();
                async move {
                    let ctx = ServiceContext::new(worker, sm);
                    dispatch(logic.as_ref(), ctx.state(), &ctx).await
                }
            });
            (state, task)
        })
        .collect()
}

/// Routes worker outcomes back into the state machine.
pub(super) struct ServiceHooks {
    pub(super) tag: Arc<str>,
    pub(super) state_machine: Arc<StateMachine>,
    pub(super) handler: Option<ExceptionHandler>,
}

impl WorkerHooks for ServiceHooks {
    fn on_completed(&self, ctx: &WorkerContext) {
        let sm = &self.state_machine;
        let advanced = sm.state_change_if(|| ctx.is_current() && sm.state() == ctx.state());
        if !advanced {
            debug!(
                service = %self.tag,
                state = %ctx.state(),
                generation = ctx.generation(),
                "worker finished without auto-advance"
            );
        }
    }

    fn on_failed(&self, ctx: &WorkerContext, err: &StateError) {
        self.state_machine.with_gate(|| {
            if !ctx.is_current() {
                warn!(
                    service = %self.tag,
                    state = %ctx.state(),
                    error = %err,
                    "superseded worker failed"
                );
                return;
            }
            match &self.handler {
                Some(handler) => handler(&self.state_machine, err),
                None => error!(
                    service = %self.tag,
                    state = %ctx.state(),
                    error = %err,
                    reason = err.as_label(),
                    "state worker failed; no exception handler"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::assembly::{Limits, Scale};
    use crate::attribute::Value;

    struct Quick;

    #[async_trait]
    impl ServiceLogic for Quick {
        async fn starting(&self, _ctx: &ServiceContext) -> Result<(), StateError> {
            Ok(())
        }

        async fn execute(&self, ctx: &ServiceContext) -> Result<(), StateError> {
            ctx.cancelled().await;
            Err(StateError::Canceled)
        }

        async fn completing(&self, _ctx: &ServiceContext) -> Result<(), StateError> {
            Ok(())
        }
    }

    fn operator(svc: &Service) {
        svc.op_src_mode().attribute("StateOpOp").unwrap().set_value(true);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_starts_offline_with_commands_disabled() {
        let svc = Service::builder("dosing", "", Quick).build().unwrap();
        assert_eq!(svc.mode(), OperationMode::Offline);
        assert_eq!(svc.state(), State::Idle);
        assert_eq!(svc.state_machine().attribute("CommandEn").unwrap().as_int(), 0);
        assert!(!svc.execute_command(Command::Start));
        assert_eq!(svc.thread_control().generation(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_leaving_offline_applies_configuration_and_spawns_idle() {
        let svc = Service::builder("dosing", "", Quick).build().unwrap();
        let limits = Limits::new(0.0, 100.0);
        let p = ParameterElement::dint("setpoint", "", limits, Scale::default(), 0);
        p.op_src_mode().attribute("StateOpOp").unwrap().set_value(true);
        p.assembly().attribute("VOp").unwrap().set_value(42);
        svc.add_configuration_parameter(p.clone());

        operator(&svc);
        assert_eq!(p.v_out(), Value::Int(42));
        assert_eq!(svc.thread_control().running_state(), Some(State::Idle));
        assert!(svc.op_src_mode().offline_allowed());
        svc.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_procedure_parameters_follow_service_mode() {
        let svc = Service::builder("dosing", "", Quick).build().unwrap();
        let mut proc = Procedure::new(1, "cont", "", false, true).unwrap();
        let p = ParameterElement::dint("amount", "", Limits::default(), Scale::default(), 0);
        proc.add_procedure_parameter(p.clone());
        svc.add_procedure(proc);

        operator(&svc);
        assert_eq!(p.op_src_mode().mode(), OperationMode::Operator);
        assert_eq!(svc.op_src_mode().linked_count(), 1);

        assert!(svc.execute_command(Command::Start));
        tokio::time::timeout(Duration::from_secs(2), async {
            while svc.state() != State::Execute {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(!svc.op_src_mode().offline_allowed());
        svc.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_element_leaves() {
        let svc = Service::builder("dosing", "", Quick).build().unwrap();
        let leaves: Vec<_> = svc.leaves().into_iter().map(|(n, _)| n).collect();
        assert_eq!(leaves, vec!["op_src_mode", "state_machine", "procedure_control"]);
        assert_eq!(svc.tag_name(), "dosing");
    }
}
