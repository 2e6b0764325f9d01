//! # Service lifecycle state machine.
//!
//! Owns `CommandOp/Int/Ext`, `StateCur` and `CommandEn`, and performs every
//! lifecycle transition of a service.
//!
//! ## Command dispatch
//! ```text
//! CommandOp  ─┐
//! CommandInt ─┼─ authoritative channel? ─► code 0? ─────────► ignored
//! CommandExt ─┘                            unknown code? ───► CommandRejected
//!                                          not enabled? ────► CommandRejected
//!                                          otherwise ───────► named transition,
//!                                                             channel reset to 0
//! ```
//!
//! ## Transition
//! ```text
//! change_state_to(new):
//!   act/prev ─► StateCur ─► CommandEn table ─► no-procedure guard
//!            ─► CommandEn attribute ─► StateChanged ─► execution routine
//! ```
//!
//! Every transition, dispatch and auto-advance runs under one re-entrant
//! gate, so a subscriber that issues a command from inside a transition on
//! the same thread re-enters instead of deadlocking.
//!
//! ## No-procedure guard
//! While installed, idle with `ProcedureReq == 0` disables every command.
//! It is evaluated on install, on each `ProcedureReq` write and on every
//! transition. Installed on entering operator mode and by `reset`; removed
//! on leaving operator mode and by `start`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, info, warn};

use crate::attribute::{Attribute, AttributeMap, DataType};
use crate::events::{Bus, Event, EventKind};
use crate::mode::{OperationMode, OperationSourceMode, RequestChannel};

use super::codes::{Command, State};
use super::command_en::CommandEnControl;
use super::procedure_control::ProcedureControl;

/// Called after every transition with the new state.
pub type ExecutionRoutine = Arc<dyn Fn(State) + Send + Sync>;

const NO_PROCEDURE_GUARD: &str = "no_procedure_guard";

#[derive(Debug, Clone, Copy)]
struct States {
    act: State,
    prev: State,
}

/// Lifecycle of one service.
pub struct StateMachine {
    owner: Arc<str>,
    attributes: AttributeMap,
    command_op: Arc<Attribute>,
    command_int: Arc<Attribute>,
    command_ext: Arc<Attribute>,
    state_cur: Arc<Attribute>,
    command_en_attr: Arc<Attribute>,

    command_en: CommandEnControl,
    op_src_mode: Arc<OperationSourceMode>,
    procedure_control: Arc<ProcedureControl>,

    gate: ReentrantMutex<()>,
    states: Mutex<States>,
    guard: AtomicBool,
    routine: RwLock<Option<ExecutionRoutine>>,
    bus: Bus,
    me: Weak<StateMachine>,
}

impl StateMachine {
    pub fn new(
        owner: impl Into<Arc<str>>,
        op_src_mode: Arc<OperationSourceMode>,
        procedure_control: Arc<ProcedureControl>,
        bus: Bus,
    ) -> Arc<Self> {
        let owner = owner.into();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let int = |name: &str, init: i64| Attribute::new(name, DataType::Int, init);
            let mut attributes = AttributeMap::new();
            let command_op = attributes.insert(int("CommandOp", 0));
            let command_int = attributes.insert(int("CommandInt", 0));
            let command_ext = attributes.insert(int("CommandExt", 0));
            let state_cur = attributes.insert(int("StateCur", State::Idle.code()));
            let command_en_attr = attributes.insert(int("CommandEn", 0));

            for (attr, channel) in [
                (&command_op, RequestChannel::Op),
                (&command_int, RequestChannel::Int),
                (&command_ext, RequestChannel::Ext),
            ] {
                let weak = weak.clone();
                attr.attach_subscription_callback(
                    move |v| {
                        if let Some(sm) = weak.upgrade() {
                            sm.on_command(channel, v.as_int());
                        }
                    },
                    None,
                );
            }

            Self {
                owner,
                attributes,
                command_op,
                command_int,
                command_ext,
                state_cur,
                command_en_attr,
                command_en: CommandEnControl::new(),
                op_src_mode,
                procedure_control,
                gate: ReentrantMutex::new(()),
                states: Mutex::new(States {
                    act: State::Idle,
                    prev: State::Idle,
                }),
                guard: AtomicBool::new(false),
                routine: RwLock::new(None),
                bus,
                me: weak.clone(),
            }
        })
    }

    /// Installs the callback run after every transition.
    pub fn set_execution_routine(&self, routine: ExecutionRoutine) {
        *self.routine.write() = Some(routine);
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.get(name)
    }

    pub fn state(&self) -> State {
        self.states.lock().act
    }

    pub fn previous_state(&self) -> State {
        self.states.lock().prev
    }

    pub fn command_en(&self) -> &CommandEnControl {
        &self.command_en
    }

    pub fn procedure_control(&self) -> &Arc<ProcedureControl> {
        &self.procedure_control
    }

    pub fn op_src_mode(&self) -> &Arc<OperationSourceMode> {
        &self.op_src_mode
    }

    /// Runs `f` under the transition gate.
    pub fn with_gate<R>(&self, f: impl FnOnce() -> R) -> R {
        let _g = self.gate.lock();
        f()
    }

    fn channel_attr(&self, channel: RequestChannel) -> &Arc<Attribute> {
        match channel {
            RequestChannel::Op => &self.command_op,
            RequestChannel::Int => &self.command_int,
            RequestChannel::Ext => &self.command_ext,
        }
    }

    fn on_command(&self, channel: RequestChannel, code: i64) {
        if code == 0 {
            return;
        }
        if !channel.authorized(&self.op_src_mode) {
            debug!(
                service = %self.owner,
                channel = channel.as_label(),
                code,
                "command channel not authoritative"
            );
            return;
        }

        let _g = self.gate.lock();
        let Some(cmd) = Command::from_code(code) else {
            debug!(service = %self.owner, code, "unknown command code");
            self.bus.publish(
                Event::new(EventKind::CommandRejected)
                    .with_service(self.owner.clone())
                    .with_state(self.state())
                    .with_reason("unknown"),
            );
            return;
        };

        if self.execute_command(cmd) {
            if let Some(ch) = RequestChannel::authoritative(&self.op_src_mode) {
                self.channel_attr(ch).set_value(0);
            }
        }
    }

    /// Runs the named transition for `cmd`. Returns whether it was applied.
    pub fn execute_command(&self, cmd: Command) -> bool {
        match cmd {
            Command::Reset => self.reset(),
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Hold => self.hold(),
            Command::Unhold => self.unhold(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Abort => self.abort(),
            Command::Restart => self.restart(),
            Command::Complete => self.complete(),
        }
    }

    /// Checks the enable mask; publishes `CommandRejected` when disabled.
    fn permitted(&self, cmd: Command) -> bool {
        if self.command_en.is_enabled(cmd) {
            return true;
        }
        let state = self.state();
        debug!(service = %self.owner, command = %cmd, state = %state, "command not enabled");
        self.bus.publish(
            Event::new(EventKind::CommandRejected)
                .with_service(self.owner.clone())
                .with_state(state)
                .with_command(cmd)
                .with_reason("disabled"),
        );
        false
    }

    fn transition(&self, cmd: Command, to: State) -> bool {
        let _g = self.gate.lock();
        if !self.permitted(cmd) {
            return false;
        }
        self.change_state_to(to, Some(cmd));
        true
    }

    /// Selects the procedure and moves to `starting`. Stays in idle if no
    /// procedure can be selected.
    pub fn start(&self) -> bool {
        let _g = self.gate.lock();
        if !self.permitted(Command::Start) {
            return false;
        }
        if let Err(e) = self.procedure_control.set_procedure_cur(self.state()) {
            warn!(service = %self.owner, error = %e, reason = e.as_label(), "start rejected");
            return false;
        }
        self.remove_no_procedure_guard();
        self.procedure_control.clear_requests();
        self.procedure_control.apply_procedure_parameters();
        self.change_state_to(State::Starting, Some(Command::Start));
        true
    }

    pub fn restart(&self) -> bool {
        self.transition(Command::Restart, State::Starting)
    }

    pub fn complete(&self) -> bool {
        self.transition(Command::Complete, State::Completing)
    }

    pub fn pause(&self) -> bool {
        self.transition(Command::Pause, State::Pausing)
    }

    pub fn resume(&self) -> bool {
        self.transition(Command::Resume, State::Resuming)
    }

    pub fn hold(&self) -> bool {
        self.transition(Command::Hold, State::Holding)
    }

    pub fn unhold(&self) -> bool {
        self.transition(Command::Unhold, State::Unholding)
    }

    pub fn stop(&self) -> bool {
        self.transition(Command::Stop, State::Stopping)
    }

    pub fn abort(&self) -> bool {
        self.transition(Command::Abort, State::Aborting)
    }

    /// Moves to `resetting` and re-installs the no-procedure guard.
    pub fn reset(&self) -> bool {
        let _g = self.gate.lock();
        if !self.transition(Command::Reset, State::Resetting) {
            return false;
        }
        self.install_no_procedure_guard();
        true
    }

    /// Auto-advance along the successor table.
    ///
    /// In `execute` this only completes self-completing procedures.
    pub fn state_change(&self) -> bool {
        let _g = self.gate.lock();
        let act = self.state();
        if act == State::Execute {
            let self_completing = self
                .procedure_control
                .current_procedure()
                .is_some_and(|p| p.is_self_completing());
            if !self_completing {
                debug!(service = %self.owner, "execute finished; procedure is not self-completing");
                return false;
            }
        }
        match act.successor() {
            Some(next) => {
                self.change_state_to(next, None);
                true
            }
            None => false,
        }
    }

    /// `state_change` if `cond` holds, both under the gate.
    pub(crate) fn state_change_if(&self, cond: impl FnOnce() -> bool) -> bool {
        let _g = self.gate.lock();
        cond() && self.state_change()
    }

    fn change_state_to(&self, new: State, cmd: Option<Command>) {
        let prev = {
            let mut s = self.states.lock();
            s.prev = s.act;
            s.act = new;
            s.prev
        };
        self.state_cur.set_value(new.code());
        self.command_en.execute(new);
        self.evaluate_guard();
        self.update_command_en();

        info!(service = %self.owner, state = %new, previous = %prev, "state changed");
        let mut ev = Event::new(EventKind::StateChanged)
            .with_service(self.owner.clone())
            .with_state(new)
            .with_previous(prev);
        if let Some(cmd) = cmd {
            ev = ev.with_command(cmd);
        }
        self.bus.publish(ev);

        let routine = self.routine.read().clone();
        if let Some(routine) = routine {
            routine(new);
        }
    }

    /// Copies the enable mask into `CommandEn`.
    pub fn update_command_en(&self) {
        self.command_en_attr.set_value(self.command_en.command_en());
    }

    pub fn enable_pause_loop(&self, enabled: bool) {
        self.with_gate(|| {
            self.command_en.enable_pause_loop(enabled);
            self.update_command_en();
        });
    }

    pub fn enable_hold_loop(&self, enabled: bool) {
        self.with_gate(|| {
            self.command_en.enable_hold_loop(enabled);
            self.update_command_en();
        });
    }

    pub fn enable_restart(&self, enabled: bool) {
        self.with_gate(|| {
            self.command_en.enable_restart(enabled);
            self.update_command_en();
        });
    }

    pub(crate) fn disable_all_commands(&self) {
        self.with_gate(|| {
            self.command_en.disable_all();
            self.update_command_en();
        });
    }

    pub(crate) fn restore_default_commands(&self) {
        self.with_gate(|| {
            self.command_en.set_default();
            self.update_command_en();
        });
    }

    pub fn is_no_procedure_guard_installed(&self) -> bool {
        self.guard.load(Ordering::Acquire)
    }

    pub fn install_no_procedure_guard(&self) {
        let _g = self.gate.lock();
        self.guard.store(true, Ordering::Release);
        let weak = self.me.clone();
        self.procedure_control.procedure_req().attach_subscription_callback(
            move |_| {
                if let Some(sm) = weak.upgrade() {
                    let _g = sm.gate.lock();
                    sm.evaluate_guard();
                    sm.update_command_en();
                }
            },
            Some(NO_PROCEDURE_GUARD),
        );
        self.evaluate_guard();
        self.update_command_en();
    }

    pub fn remove_no_procedure_guard(&self) {
        let _g = self.gate.lock();
        if !self.guard.swap(false, Ordering::AcqRel) {
            return;
        }
        self.procedure_control
            .procedure_req()
            .remove_subscription_callback(Some(NO_PROCEDURE_GUARD));
        if self.op_src_mode.mode() != OperationMode::Offline {
            self.command_en.execute(self.state());
            self.update_command_en();
        }
    }

    fn evaluate_guard(&self) {
        if !self.is_no_procedure_guard_installed() {
            return;
        }
        let act = self.state();
        if act == State::Idle && self.procedure_control.procedure_req_id() == 0 {
            self.command_en.disable_all();
        } else if self.op_src_mode.mode() != OperationMode::Offline {
            self.command_en.execute(act);
        }
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = *self.states.lock();
        f.debug_struct("StateMachine")
            .field("owner", &self.owner)
            .field("state", &s.act)
            .field("previous", &s.prev)
            .field("command_en", &self.command_en.command_en())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Element;
    use crate::control::Procedure;

    fn setup(default_procedure: bool) -> (Arc<OperationSourceMode>, Arc<StateMachine>) {
        let mode = OperationSourceMode::new("svc");
        let pc = ProcedureControl::new("svc", mode.clone());
        pc.add_procedure(Arc::new(
            Procedure::new(1, "cont", "", false, default_procedure).unwrap(),
        ));
        let sm = StateMachine::new("svc", mode.clone(), pc, Bus::new(64));
        mode.attribute("StateOpOp").unwrap().set_value(true);
        (mode, sm)
    }

    fn command(sm: &StateMachine, name: &str, cmd: Command) {
        sm.attribute(name).unwrap().set_value(cmd.code());
    }

    #[test]
    fn test_operator_channel_drives_lifecycle() {
        let (_mode, sm) = setup(true);
        command(&sm, "CommandOp", Command::Start);
        assert_eq!(sm.state(), State::Starting);
        assert_eq!(sm.attribute("StateCur").unwrap().as_int(), State::Starting.code());
        assert_eq!(sm.attribute("CommandOp").unwrap().as_int(), 0, "channel reset");

        assert!(sm.state_change());
        assert_eq!(sm.state(), State::Execute);
        assert_eq!(
            sm.attribute("CommandEn").unwrap().as_int(),
            Command::Complete.code() | Command::Stop.code() | Command::Abort.code()
        );
    }

    #[test]
    fn test_wrong_channel_is_ignored() {
        let (_mode, sm) = setup(true);
        command(&sm, "CommandExt", Command::Start);
        assert_eq!(sm.state(), State::Idle);
        assert_eq!(sm.attribute("CommandExt").unwrap().as_int(), Command::Start.code());
    }

    #[tokio::test]
    async fn test_disabled_and_unknown_codes_are_rejected() {
        let (_mode, sm) = setup(true);
        let mut rx = sm.bus.subscribe();

        command(&sm, "CommandOp", Command::Unhold);
        assert_eq!(sm.state(), State::Idle);
        assert_eq!(sm.attribute("CommandOp").unwrap().as_int(), Command::Unhold.code());
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::CommandRejected);
        assert_eq!(ev.command, Some(Command::Unhold));

        sm.attribute("CommandOp").unwrap().set_value(3);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.reason.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_execute_waits_unless_self_completing() {
        let (_mode, sm) = setup(true);
        assert!(sm.start());
        assert!(sm.state_change());
        assert!(!sm.state_change());
        assert_eq!(sm.state(), State::Execute);

        let p = sm.procedure_control().current_procedure().unwrap();
        p.assembly().attribute("IsSelfCompleting").unwrap().set_value(true);
        assert!(sm.state_change());
        assert_eq!(sm.state(), State::Completing);
        assert!(sm.state_change());
        assert_eq!(sm.state(), State::Completed);
        assert!(!sm.state_change());
    }

    #[test]
    fn test_guard_blocks_start_without_procedure() {
        let (_mode, sm) = setup(false);
        sm.install_no_procedure_guard();
        assert_eq!(sm.attribute("CommandEn").unwrap().as_int(), 0);
        assert!(!sm.start());

        sm.procedure_control().attribute("ProcedureOp").unwrap().set_value(1);
        assert_eq!(
            sm.attribute("CommandEn").unwrap().as_int(),
            Command::Start.code() | Command::Stop.code() | Command::Abort.code()
        );
        assert!(sm.start());
        assert!(!sm.is_no_procedure_guard_installed());
        assert_eq!(sm.procedure_control().procedure_req_id(), 1);
    }

    #[test]
    fn test_reset_reinstalls_guard() {
        let (_mode, sm) = setup(true);
        sm.start();
        sm.state_change();
        sm.stop();
        sm.state_change();
        assert_eq!(sm.state(), State::Stopped);
        assert!(sm.reset());
        assert!(sm.is_no_procedure_guard_installed());
        sm.state_change();
        assert_eq!(sm.state(), State::Idle);
        assert!(sm.command_en().is_enabled(Command::Start), "default procedure still requested");
    }

    #[test]
    fn test_execution_routine_sees_every_transition() {
        let (_mode, sm) = setup(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        sm.set_execution_routine(Arc::new(move |st: State| s.lock().push(st)));
        sm.start();
        sm.state_change();
        sm.hold();
        assert_eq!(*seen.lock(), vec![State::Starting, State::Execute]);

        sm.enable_hold_loop(true);
        assert!(sm.hold());
        assert_eq!(seen.lock().last(), Some(&State::Holding));
    }
}
