//! # Procedures: selectable variants of a service.
//!
//! A procedure is a diagnostic data assembly (`ProcedureId`,
//! `IsSelfCompleting`, `IsDefault`) that groups the parameters applied on
//! `start` and the values it reports while running.

use std::sync::Arc;

use tracing::debug;

use crate::assembly::{DataAssembly, Element, ElementKind, IndicatorElement, ParameterElement};
use crate::attribute::{Attribute, DataType};
use crate::error::ServiceError;

/// One selectable procedure of a service.
#[derive(Debug)]
pub struct Procedure {
    id: i64,
    assembly: DataAssembly,
    is_self_completing: Arc<Attribute>,
    is_default: Arc<Attribute>,
    procedure_parameters: Vec<Arc<ParameterElement>>,
    report_values: Vec<Arc<IndicatorElement>>,
    process_value_outs: Vec<Arc<IndicatorElement>>,
}

impl Procedure {
    /// Creates a procedure.
    ///
    /// # Errors
    /// [`ServiceError::InvalidProcedureId`] when `id <= 0`.
    pub fn new(
        id: i64,
        tag: &str,
        description: &str,
        is_self_completing: bool,
        is_default: bool,
    ) -> Result<Self, ServiceError> {
        if id <= 0 {
            return Err(ServiceError::InvalidProcedureId {
                tag: tag.to_string(),
                id,
            });
        }

        let mut assembly = DataAssembly::new(tag, description, ElementKind::Diagnostic);
        let is_self_completing = assembly.add_attribute(Attribute::new(
            "IsSelfCompleting",
            DataType::Bool,
            is_self_completing,
        ));
        assembly.add_attribute(Attribute::new("ProcedureId", DataType::Int, id));
        let is_default =
            assembly.add_attribute(Attribute::new("IsDefault", DataType::Bool, is_default));

        Ok(Self {
            id,
            assembly,
            is_self_completing,
            is_default,
            procedure_parameters: Vec::new(),
            report_values: Vec::new(),
            process_value_outs: Vec::new(),
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Live value of `IsSelfCompleting`; bindings may toggle it.
    pub fn is_self_completing(&self) -> bool {
        self.is_self_completing.as_bool()
    }

    pub fn is_default(&self) -> bool {
        self.is_default.as_bool()
    }

    pub fn add_procedure_parameter(&mut self, parameter: Arc<ParameterElement>) {
        upsert(&mut self.procedure_parameters, parameter);
    }

    pub fn add_report_value(&mut self, value: Arc<IndicatorElement>) {
        upsert(&mut self.report_values, value);
    }

    pub fn add_process_value_out(&mut self, value: Arc<IndicatorElement>) {
        upsert(&mut self.process_value_outs, value);
    }

    /// Process value inputs are not supported.
    ///
    /// # Errors
    /// Always [`ServiceError::UnsupportedElement`].
    pub fn add_process_value_in(&mut self, value: Arc<dyn Element>) -> Result<(), ServiceError> {
        Err(ServiceError::UnsupportedElement {
            what: format!(
                "process value in '{}' on procedure '{}'",
                value.tag_name(),
                self.assembly.tag_name()
            ),
        })
    }

    pub fn procedure_parameters(&self) -> &[Arc<ParameterElement>] {
        &self.procedure_parameters
    }

    pub fn procedure_parameter(&self, tag: &str) -> Option<&Arc<ParameterElement>> {
        self.procedure_parameters.iter().find(|p| p.tag_name() == tag)
    }

    pub fn report_values(&self) -> &[Arc<IndicatorElement>] {
        &self.report_values
    }

    pub fn process_value_outs(&self) -> &[Arc<IndicatorElement>] {
        &self.process_value_outs
    }

    /// Copies every procedure parameter's request to its output.
    pub fn apply_procedure_parameters(&self) {
        debug!(procedure = %self.assembly.tag_name(), "applying procedure parameters");
        for p in &self.procedure_parameters {
            p.set_v_out();
        }
    }
}

impl Element for Procedure {
    fn assembly(&self) -> &DataAssembly {
        &self.assembly
    }
}

/// Inserts by tag name, replacing in place.
pub(crate) fn upsert<T: Element + ?Sized>(list: &mut Vec<Arc<T>>, item: Arc<T>) {
    match list.iter_mut().find(|e| e.tag_name() == item.tag_name()) {
        Some(slot) => *slot = item,
        None => list.push(item),
    }
}
