use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::logic::ServiceLogic;
use super::service::{handler_table, ExceptionHandler, Service, ServiceHooks, ServiceInner};
use crate::assembly::{DataAssembly, ElementKind};
use crate::config::ServiceConfig;
use crate::control::{ProcedureControl, StateMachine};
use crate::error::{ServiceError, StateError};
use crate::events::Bus;
use crate::mode::OperationSourceMode;
use crate::runtime::ThreadControl;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Service`].
pub struct ServiceBuilder {
    tag: String,
    description: String,
    logic: Arc<dyn ServiceLogic>,
    cfg: ServiceConfig,
    handler: Option<ExceptionHandler>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Option<Bus>,
    runtime: Option<Handle>,
}

impl Service {
    /// Starts building a service running `logic`.
    pub fn builder(tag: &str, description: &str, logic: impl ServiceLogic) -> ServiceBuilder {
        ServiceBuilder {
            tag: tag.to_string(),
            description: description.to_string(),
            logic: Arc::new(logic),
            cfg: ServiceConfig::default(),
            handler: None,
            subscribers: Vec::new(),
            bus: None,
            runtime: None,
        }
    }
}

impl ServiceBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, cfg: ServiceConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn pause_loop(mut self, enabled: bool) -> Self {
        self.cfg.pause_loop = enabled;
        self
    }

    pub fn hold_loop(mut self, enabled: bool) -> Self {
        self.cfg.hold_loop = enabled;
        self
    }

    pub fn restart(mut self, enabled: bool) -> Self {
        self.cfg.restart = enabled;
        self
    }

    /// Handler for errors and panics of the current state worker.
    ///
    /// Without one, worker errors are logged and swallowed.
    pub fn exception_handler(
        mut self,
        handler: impl Fn(&StateMachine, &StateError) + Send + Sync + 'static,
    ) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Event subscribers, fed through bounded per-subscriber queues.
    pub fn subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Publishes to an existing bus instead of a new one.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Runtime that state workers and subscribers are spawned on.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the service. It starts offline with all commands disabled.
    ///
    /// # Errors
    /// [`ServiceError::NoRuntime`] when no runtime handle was given and the
    /// caller is not inside a tokio runtime.
    pub fn build(self) -> Result<Service, ServiceError> {
        let handle = match self.runtime {
            Some(h) => h,
            None => Handle::try_current().map_err(|_| ServiceError::NoRuntime)?,
        };
        let tag: Arc<str> = Arc::from(self.tag.as_str());
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));

        let op_src_mode = OperationSourceMode::new(tag.clone());
        let procedure_control = ProcedureControl::new(tag.clone(), op_src_mode.clone());
        let state_machine = StateMachine::new(
            tag.clone(),
            op_src_mode.clone(),
            procedure_control.clone(),
            bus.clone(),
        );
        state_machine.enable_pause_loop(self.cfg.pause_loop);
        state_machine.enable_hold_loop(self.cfg.hold_loop);
        state_machine.enable_restart(self.cfg.restart);

        let hooks = Arc::new(ServiceHooks {
            tag: tag.clone(),
            state_machine: state_machine.clone(),
            handler: self.handler,
        });
        let thread_control = ThreadControl::new(tag.clone(), handle.clone(), bus.clone(), hooks);

        let forwarder = if self.subscribers.is_empty() {
            None
        } else {
            let subs = SubscriberSet::new(self.subscribers, bus.clone(), &handle);
            Some(spawn_forwarder(
                &bus,
                subs,
                thread_control.root_token().clone(),
                &handle,
            ))
        };

        let inner = ServiceInner {
            assembly: DataAssembly::new(
                tag.clone(),
                self.description.as_str(),
                ElementKind::ServiceControl,
            ),
            handlers: handler_table(self.logic, &state_machine),
            tag,
            op_src_mode,
            procedure_control,
            state_machine,
            thread_control,
            configuration_parameters: RwLock::new(Vec::new()),
            bus,
            forwarder: Mutex::new(forwarder),
        };
        Ok(Service::wire(inner))
    }
}

/// Copies bus events into the subscriber set until `token` is cancelled,
/// then drains the subscriber queues.
fn spawn_forwarder(
    bus: &Bus,
    subs: SubscriberSet,
    token: CancellationToken,
    handle: &Handle,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    handle.spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit_arc(Arc::new(ev)),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event forwarder lagged");
                    }
                }
            }
        }
        subs.shutdown().await;
    })
}
