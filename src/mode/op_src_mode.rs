//! # Operation/source mode arbitration.
//!
//! Decides who controls a service (or active element): nobody (`Offline`),
//! the operator, or the automation layer; and, while not offline, where set
//! points come from (internal vs external/manual).
//!
//! ## Request flow
//! ```text
//! StateOffAut ─┐                          ┌─ authorized? (StateChannel = true)
//! StateOpAut  ─┼─► set_value(true) ──► on_state_request
//! StateAutAut ─┘                          └─ authorized? (StateChannel = false) ◄─ StateOffOp/OpOp/AutOp
//!                                                │
//!                                                ▼
//!                      set act flags → exit-<prev> → enter-<new> → force source
//!                                                │
//!                                                └─► mirror request to linked modes
//! ```
//!
//! ## Rules
//! - Exactly one of `StateOffAct/StateOpAct/StateAutAct` is true.
//! - Source flags are both false while offline; entering automatic forces
//!   internal, entering operator or offline clears the source.
//! - `*Op` requests clear themselves after a true write so repeated writes
//!   re-trigger.
//! - Every request and channel write is mirrored to linked modes (one-way,
//!   regardless of the linked mode's own channel).
//! - While offline switching is disallowed, offline requests are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::attribute::{Attribute, AttributeMap, DataType, Value};

use super::source::{Side, SourceMode, SourceSection};

/// Control authority over a service or active element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationMode {
    Offline,
    Operator,
    Automatic,
}

impl OperationMode {
    pub fn as_label(self) -> &'static str {
        match self {
            OperationMode::Offline => "off",
            OperationMode::Operator => "op",
            OperationMode::Automatic => "aut",
        }
    }

    fn index(self) -> usize {
        match self {
            OperationMode::Offline => 0,
            OperationMode::Operator => 1,
            OperationMode::Automatic => 2,
        }
    }
}

/// Hook run on mode entry or exit.
pub type ModeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Hooks {
    enter: [Vec<ModeCallback>; 3],
    exit: [Vec<ModeCallback>; 3],
}

/// Operation and source mode of one service (or active element).
pub struct OperationSourceMode {
    owner: Arc<str>,
    attributes: AttributeMap,

    state_channel: Arc<Attribute>,
    state_off_aut: Arc<Attribute>,
    state_op_aut: Arc<Attribute>,
    state_aut_aut: Arc<Attribute>,
    state_off_op: Arc<Attribute>,
    state_op_op: Arc<Attribute>,
    state_aut_op: Arc<Attribute>,
    state_op_act: Arc<Attribute>,
    state_aut_act: Arc<Attribute>,
    state_off_act: Arc<Attribute>,
    source: SourceSection,

    offline_allowed: AtomicBool,
    hooks: Mutex<Hooks>,
    linked: Mutex<Vec<Arc<OperationSourceMode>>>,
}

impl OperationSourceMode {
    /// Mode for a service: sources are internal/external.
    pub fn new(owner: impl Into<Arc<str>>) -> Arc<Self> {
        Self::build(owner.into(), SourceMode::External)
    }

    /// Mode for an active element: sources are internal/manual.
    pub fn for_active_element(owner: impl Into<Arc<str>>) -> Arc<Self> {
        Self::build(owner.into(), SourceMode::Manual)
    }

    fn build(owner: Arc<str>, alt: SourceMode) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let flag = |name: &str, init: bool| Attribute::new(name, DataType::Bool, init);

            let state_channel = flag("StateChannel", false);
            let state_off_aut = flag("StateOffAut", false);
            let state_op_aut = flag("StateOpAut", false);
            let state_aut_aut = flag("StateAutAut", false);
            let state_off_op = flag("StateOffOp", false);
            let state_op_op = flag("StateOpOp", false);
            let state_aut_op = flag("StateAutOp", false);
            let state_op_act = flag("StateOpAct", false);
            let state_aut_act = flag("StateAutAct", false);
            let state_off_act = flag("StateOffAct", true);
            let source = SourceSection::new(alt);

            subscribe(&state_channel, weak, |m, v| m.mirror("StateChannel", &Value::Bool(v)));
            for (attr, target, side) in [
                (&state_off_aut, OperationMode::Offline, Side::Aut),
                (&state_op_aut, OperationMode::Operator, Side::Aut),
                (&state_aut_aut, OperationMode::Automatic, Side::Aut),
                (&state_off_op, OperationMode::Offline, Side::Op),
                (&state_op_op, OperationMode::Operator, Side::Op),
                (&state_aut_op, OperationMode::Automatic, Side::Op),
            ] {
                subscribe(attr, weak, move |m, v| m.on_state_request(target, side, v));
            }

            subscribe(&source.channel, weak, |m, v| m.mirror("SrcChannel", &Value::Bool(v)));
            for (target, side) in [
                (SourceMode::Internal, Side::Aut),
                (SourceMode::Internal, Side::Op),
                (alt, Side::Aut),
                (alt, Side::Op),
            ] {
                subscribe(source.attr(target, side), weak, move |m, v| {
                    m.on_source_request(target, side, v)
                });
            }

            let mut attributes = AttributeMap::new();
            for a in [
                &state_channel,
                &state_off_aut,
                &state_op_aut,
                &state_aut_aut,
                &state_off_op,
                &state_op_op,
                &state_aut_op,
                &state_op_act,
                &state_aut_act,
                &state_off_act,
            ] {
                attributes.insert(Arc::clone(a));
            }
            source.register(&mut attributes);

            Self {
                owner,
                attributes,
                state_channel,
                state_off_aut,
                state_op_aut,
                state_aut_aut,
                state_off_op,
                state_op_op,
                state_aut_op,
                state_op_act,
                state_aut_act,
                state_off_act,
                source,
                offline_allowed: AtomicBool::new(true),
                hooks: Mutex::new(Hooks::default()),
                linked: Mutex::new(Vec::new()),
            }
        })
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.get(name)
    }

    pub fn mode(&self) -> OperationMode {
        if self.state_op_act.as_bool() {
            OperationMode::Operator
        } else if self.state_aut_act.as_bool() {
            OperationMode::Automatic
        } else {
            OperationMode::Offline
        }
    }

    /// Active source, `None` while no source flag is set.
    pub fn source(&self) -> Option<SourceMode> {
        self.source.source()
    }

    /// Guard used by services: while `false`, offline requests are dropped.
    pub fn allow_switch_to_offline_mode(&self, allowed: bool) {
        self.offline_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn offline_allowed(&self) -> bool {
        self.offline_allowed.load(Ordering::SeqCst)
    }

    pub fn add_enter_callback(&self, mode: OperationMode, cb: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().enter[mode.index()].push(Arc::new(cb));
    }

    pub fn add_exit_callback(&self, mode: OperationMode, cb: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().exit[mode.index()].push(Arc::new(cb));
    }

    /// Registers a dependent mode that receives every request and channel write.
    ///
    /// Linking a mode to itself, or twice, is ignored. Longer cycles are not
    /// detected; they are cut by the attribute fan-out depth bound.
    pub fn add_linked_op_src_mode(self: &Arc<Self>, linked: Arc<OperationSourceMode>) {
        if Arc::ptr_eq(self, &linked) {
            return;
        }
        let mut list = self.linked.lock();
        if !list.iter().any(|l| Arc::ptr_eq(l, &linked)) {
            list.push(linked);
        }
    }

    pub fn linked_count(&self) -> usize {
        self.linked.lock().len()
    }

    fn on_state_request(&self, target: OperationMode, side: Side, value: bool) {
        debug!(owner = %self.owner, target = target.as_label(), ?side, value, "mode request");
        if value {
            let authorized = side.authorized(self.state_channel.as_bool());
            let blocked = target == OperationMode::Offline && !self.offline_allowed();
            if authorized && !blocked && self.mode() != target {
                self.transition_to(target);
            } else if blocked {
                debug!(owner = %self.owner, "offline switch not allowed; request dropped");
            }
        }

        let name = self.request_attr(target, side).name().to_string();
        match side {
            Side::Aut => self.mirror(&name, &Value::Bool(value)),
            Side::Op if value => {
                self.request_attr(target, side).set_value(false);
                self.mirror(&name, &Value::Bool(true));
            }
            Side::Op => {}
        }
    }

    fn on_source_request(&self, target: SourceMode, side: Side, value: bool) {
        let active = self.mode() != OperationMode::Offline;
        if self.source.request(&self.owner, target, side, value, active) {
            let name = self.source.attr(target, side).name().to_string();
            self.mirror(&name, &Value::Bool(value));
        }
    }

    fn transition_to(&self, new: OperationMode) {
        let prev = self.mode();

        self.state_op_act.set_value(new == OperationMode::Operator);
        self.state_aut_act.set_value(new == OperationMode::Automatic);
        self.state_off_act.set_value(new == OperationMode::Offline);

        let (exit, enter) = {
            let hooks = self.hooks.lock();
            (
                hooks.exit[prev.index()].clone(),
                hooks.enter[new.index()].clone(),
            )
        };
        for cb in exit.iter().chain(enter.iter()) {
            cb();
        }

        debug!(
            owner = %self.owner,
            from = prev.as_label(),
            to = new.as_label(),
            "operation mode switched"
        );

        match new {
            OperationMode::Automatic => self.source.switch(&self.owner, Some(SourceMode::Internal)),
            _ => self.source.switch(&self.owner, None),
        }
    }

    fn mirror(&self, name: &str, value: &Value) {
        let linked = self.linked.lock().clone();
        for l in linked {
            if let Some(attr) = l.attribute(name) {
                attr.set_value(value.clone());
            }
        }
    }

    fn request_attr(&self, target: OperationMode, side: Side) -> &Arc<Attribute> {
        match (target, side) {
            (OperationMode::Offline, Side::Aut) => &self.state_off_aut,
            (OperationMode::Operator, Side::Aut) => &self.state_op_aut,
            (OperationMode::Automatic, Side::Aut) => &self.state_aut_aut,
            (OperationMode::Offline, Side::Op) => &self.state_off_op,
            (OperationMode::Operator, Side::Op) => &self.state_op_op,
            (OperationMode::Automatic, Side::Op) => &self.state_aut_op,
        }
    }
}

impl std::fmt::Debug for OperationSourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSourceMode")
            .field("owner", &self.owner)
            .field("mode", &self.mode())
            .field("source", &self.source())
            .finish()
    }
}

fn subscribe<F>(attr: &Arc<Attribute>, weak: &Weak<OperationSourceMode>, f: F)
where
    F: Fn(&OperationSourceMode, bool) + Send + Sync + 'static,
{
    let weak = weak.clone();
    attr.attach_subscription_callback(
        move |v| {
            if let Some(m) = weak.upgrade() {
                f(&m, v.as_bool());
            }
        },
        None,
    );
}
