//! # Process equipment assembly: services and active elements of one unit.
//!
//! [`Pea`] is what a binding (wire-protocol server, manifest generator)
//! consumes. [`Pea::nodes`] flattens every attribute into a [`Node`] with a
//! dotted path:
//!
//! ```text
//! services.<svc>.<attr>
//! services.<svc>.configuration_parameters.<param>.<attr>
//! services.<svc>.configuration_parameters.<param>.op_src_mode.<attr>
//! services.<svc>.procedures.<proc>.<attr>
//! services.<svc>.procedures.<proc>.procedure_parameters.<param>.<attr>
//! services.<svc>.procedures.<proc>.report_values.<ind>.<attr>
//! services.<svc>.procedures.<proc>.process_value_outs.<ind>.<attr>
//! services.<svc>.op_src_mode.<attr>
//! services.<svc>.state_machine.<attr>
//! services.<svc>.procedure_control.<attr>
//! active_elements.<tag>.<attr>
//! active_elements.<tag>.op_src_mode.<attr>
//! ```
//!
//! A binding attaches an outbound callback to each node's attribute and
//! writes inbound values with `set_value` for writable nodes.

use std::sync::Arc;

use tracing::info;

use crate::assembly::Element;
use crate::attribute::{Attribute, AttributeMap};
use crate::control::Procedure;
use crate::error::ServiceError;
use crate::service::Service;

/// Procedure attributes that belong to the owning service's instance.
const SERVICE_SCOPED: [&str; 3] = ["ProcedureId", "IsSelfCompleting", "IsDefault"];

/// One enumerated attribute.
#[derive(Clone, Debug)]
pub struct Node {
    /// Dotted path, unique within the PEA.
    pub path: String,
    pub attribute: Arc<Attribute>,
    /// True when inbound writes reach a subscriber.
    pub writable: bool,
    /// Path of the element instance the attribute is reported under.
    pub instance_scope: Arc<str>,
}

/// Services and active elements of one unit.
#[derive(Default)]
pub struct Pea {
    services: Vec<Service>,
    active_elements: Vec<Arc<dyn Element>>,
}

impl Pea {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`ServiceError::DuplicateService`] if the tag is taken.
    pub fn add_service(&mut self, service: Service) -> Result<(), ServiceError> {
        if self.service(service.tag()).is_some() {
            return Err(ServiceError::DuplicateService {
                tag: service.tag().to_string(),
            });
        }
        info!(service = %service.tag(), "service added to pea");
        self.services.push(service);
        Ok(())
    }

    /// # Errors
    /// [`ServiceError::DuplicateService`] if the tag is taken.
    pub fn add_active_element(&mut self, element: Arc<dyn Element>) -> Result<(), ServiceError> {
        if self
            .active_elements
            .iter()
            .any(|e| e.tag_name() == element.tag_name())
        {
            return Err(ServiceError::DuplicateService {
                tag: element.tag_name().to_string(),
            });
        }
        self.active_elements.push(element);
        Ok(())
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, tag: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.tag() == tag)
    }

    pub fn active_elements(&self) -> &[Arc<dyn Element>] {
        &self.active_elements
    }

    /// Schedules the worker of every service's current state.
    pub fn set_services_in_idle(&self) {
        for s in &self.services {
            s.init_idle_state();
        }
    }

    /// Every attribute of the PEA in enumeration order.
    pub fn nodes(&self) -> Vec<Node> {
        let mut w = Walker::default();
        for s in &self.services {
            w.service(s);
        }
        for e in &self.active_elements {
            w.element("active_elements", e.as_ref());
        }
        w.nodes
    }

    /// Shuts every service down.
    pub async fn shutdown(&self) {
        for s in &self.services {
            s.shutdown().await;
        }
    }
}

impl std::fmt::Debug for Pea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pea")
            .field("services", &self.services)
            .field(
                "active_elements",
                &self.active_elements.iter().map(|e| e.tag_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Default)]
struct Walker {
    nodes: Vec<Node>,
}

impl Walker {
    fn attributes(&mut self, prefix: &str, map: &AttributeMap, scope: &Arc<str>) {
        for attr in map.iter() {
            self.push(prefix, attr, scope.clone());
        }
    }

    fn push(&mut self, prefix: &str, attr: &Arc<Attribute>, scope: Arc<str>) {
        self.nodes.push(Node {
            path: format!("{prefix}.{}", attr.name()),
            attribute: attr.clone(),
            writable: attr.is_monitored(),
            instance_scope: scope,
        });
    }

    fn leaves(&mut self, path: &Arc<str>, el: &dyn Element) {
        for (name, map) in el.leaves() {
            self.attributes(&format!("{path}.{name}"), map, path);
        }
    }

    /// Assembly attributes and leaves of a plain element.
    fn element(&mut self, prefix: &str, el: &dyn Element) {
        let path: Arc<str> = Arc::from(format!("{prefix}.{}", el.tag_name()));
        self.attributes(&path, el.assembly().attributes(), &path);
        self.leaves(&path, el);
    }

    fn service(&mut self, svc: &Service) {
        let path: Arc<str> = Arc::from(format!("services.{}", svc.tag()));
        self.attributes(&path, svc.assembly().attributes(), &path);

        let folder = format!("{path}.configuration_parameters");
        for p in svc.configuration_parameters() {
            self.element(&folder, p.as_ref());
        }
        let folder = format!("{path}.procedures");
        for p in svc.procedures() {
            self.procedure(&folder, &p, &path);
        }

        self.leaves(&path, svc);
    }

    fn procedure(&mut self, prefix: &str, p: &Procedure, service: &Arc<str>) {
        let path: Arc<str> = Arc::from(format!("{prefix}.{}", p.tag_name()));
        for attr in p.assembly().attributes().iter() {
            let scope = if SERVICE_SCOPED.contains(&attr.name()) {
                service.clone()
            } else {
                path.clone()
            };
            self.push(&path, attr, scope);
        }

        let folder = format!("{path}.procedure_parameters");
        for e in p.procedure_parameters() {
            self.element(&folder, e.as_ref());
        }
        let folder = format!("{path}.report_values");
        for e in p.report_values() {
            self.element(&folder, e.as_ref());
        }
        let folder = format!("{path}.process_value_outs");
        for e in p.process_value_outs() {
            self.element(&folder, e.as_ref());
        }
    }
}
