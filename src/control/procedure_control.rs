//! # Procedure selection.
//!
//! ```text
//! ProcedureOp  ─┐
//! ProcedureInt ─┼─ authorized channel? registered id? ─► ProcedureReq
//! ProcedureExt ─┘
//!
//! start (idle only): registered ProcedureReq, else default ─► ProcedureCur
//! ```
//!
//! Writing `0` to a request attribute leaves `ProcedureReq` untouched; `start`
//! clears the request attributes that way once a procedure is selected.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::attribute::{Attribute, AttributeMap, DataType};
use crate::error::ProcedureError;
use crate::mode::{OperationSourceMode, RequestChannel};

use super::codes::State;
use super::procedure::Procedure;

/// Registered procedures, the requested one and the current one.
pub struct ProcedureControl {
    owner: Arc<str>,
    attributes: AttributeMap,
    procedure_op: Arc<Attribute>,
    procedure_int: Arc<Attribute>,
    procedure_ext: Arc<Attribute>,
    procedure_cur: Arc<Attribute>,
    procedure_req: Arc<Attribute>,
    procedures: RwLock<Vec<Arc<Procedure>>>,
    default_id: Mutex<Option<i64>>,
    op_src_mode: Arc<OperationSourceMode>,
}

impl ProcedureControl {
    pub fn new(owner: impl Into<Arc<str>>, op_src_mode: Arc<OperationSourceMode>) -> Arc<Self> {
        let owner = owner.into();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let int = |name: &str| Attribute::new(name, DataType::Int, 0);
            let mut attributes = AttributeMap::new();
            let procedure_op = attributes.insert(int("ProcedureOp"));
            let procedure_int = attributes.insert(int("ProcedureInt"));
            let procedure_ext = attributes.insert(int("ProcedureExt"));
            let procedure_cur = attributes.insert(int("ProcedureCur"));
            let procedure_req = attributes.insert(int("ProcedureReq"));

            for (attr, channel) in [
                (&procedure_op, RequestChannel::Op),
                (&procedure_int, RequestChannel::Int),
                (&procedure_ext, RequestChannel::Ext),
            ] {
                let weak = weak.clone();
                attr.attach_subscription_callback(
                    move |v| {
                        if let Some(pc) = weak.upgrade() {
                            pc.on_request(channel, v.as_int());
                        }
                    },
                    None,
                );
            }

            Self {
                owner,
                attributes,
                procedure_op,
                procedure_int,
                procedure_ext,
                procedure_cur,
                procedure_req,
                procedures: RwLock::new(Vec::new()),
                default_id: Mutex::new(None),
                op_src_mode,
            }
        })
    }

    fn on_request(&self, channel: RequestChannel, id: i64) {
        if id == 0 {
            return;
        }
        if !channel.authorized(&self.op_src_mode) {
            debug!(
                service = %self.owner,
                channel = channel.as_label(),
                id,
                "procedure request not authorized"
            );
            return;
        }
        if self.procedure(id).is_none() {
            debug!(service = %self.owner, id, "procedure request for unknown id");
            return;
        }
        self.procedure_req.set_value(id);
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.get(name)
    }

    pub(crate) fn procedure_req(&self) -> &Arc<Attribute> {
        &self.procedure_req
    }

    /// Registers (or replaces) a procedure by id. A default procedure becomes
    /// the requested one and the init value of the request attributes.
    pub fn add_procedure(&self, procedure: Arc<Procedure>) {
        let id = procedure.id();
        let is_default = procedure.is_default();
        {
            let mut procedures = self.procedures.write();
            match procedures.iter_mut().find(|p| p.id() == id) {
                Some(slot) => *slot = procedure,
                None => procedures.push(procedure),
            }
        }
        if is_default {
            *self.default_id.lock() = Some(id);
            for attr in [&self.procedure_op, &self.procedure_int, &self.procedure_ext] {
                attr.set_init_value(id);
            }
            self.procedure_req.set_init_value(id);
            self.procedure_req.set_value(id);
        }
    }

    pub fn procedures(&self) -> Vec<Arc<Procedure>> {
        self.procedures.read().clone()
    }

    pub fn procedure(&self, id: i64) -> Option<Arc<Procedure>> {
        self.procedures.read().iter().find(|p| p.id() == id).cloned()
    }

    pub fn default_procedure_id(&self) -> Option<i64> {
        *self.default_id.lock()
    }

    pub fn procedure_req_id(&self) -> i64 {
        self.procedure_req.as_int()
    }

    /// Selects the requested procedure. An unset or unregistered request
    /// falls back to the default.
    ///
    /// # Errors
    /// - [`ProcedureError::NotIdle`] outside idle.
    /// - [`ProcedureError::Unknown`] when the requested id is not registered
    ///   and no default exists.
    /// - [`ProcedureError::NoProcedure`] when nothing is requested and no
    ///   default exists.
    pub fn set_procedure_cur(&self, state: State) -> Result<i64, ProcedureError> {
        if state != State::Idle {
            return Err(ProcedureError::NotIdle { state });
        }
        let requested = self.procedure_req.as_int();
        let id = match (requested, self.default_procedure_id()) {
            (0, default) => default.ok_or(ProcedureError::NoProcedure)?,
            (req, _) if self.procedure(req).is_some() => req,
            (req, Some(default)) => {
                debug!(
                    service = %self.owner,
                    requested = req,
                    fallback = default,
                    "unknown procedure requested, using default"
                );
                default
            }
            (req, None) => return Err(ProcedureError::Unknown(req)),
        };
        self.procedure_cur.set_value(id);
        debug!(service = %self.owner, procedure = id, "current procedure selected");
        Ok(id)
    }

    pub fn get_procedure_cur(&self) -> i64 {
        self.procedure_cur.as_int()
    }

    pub fn current_procedure(&self) -> Option<Arc<Procedure>> {
        self.procedure(self.get_procedure_cur())
    }

    /// Clears the three request attributes (written as `0`).
    pub(crate) fn clear_requests(&self) {
        for attr in [&self.procedure_op, &self.procedure_int, &self.procedure_ext] {
            attr.set_value(0);
        }
    }

    pub fn apply_procedure_parameters(&self) {
        if let Some(p) = self.current_procedure() {
            p.apply_procedure_parameters();
        }
    }
}

impl std::fmt::Debug for ProcedureControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureControl")
            .field("owner", &self.owner)
            .field("procedure_req", &self.procedure_req.as_int())
            .field("procedure_cur", &self.procedure_cur.as_int())
            .field("procedures", &self.procedures.read().len())
            .finish()
    }
}
