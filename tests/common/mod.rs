#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use mtpvisor::{Event, EventKind, Service, ServiceContext, ServiceLogic, State, StateError};

/// What `execute` does.
#[derive(Clone, Copy, Debug)]
pub enum Execute {
    /// Returns `Ok(())` right away.
    Finish,
    /// Polls every 10 ms until superseded, then returns `Canceled`.
    UntilCancelled,
    /// Ignores cancellation, returns `Ok(())` after the delay.
    Stubborn(Duration),
    Fail,
    Panic,
}

/// Shared observations of a [`Probe`].
#[derive(Default)]
pub struct Seen {
    pub contexts: Mutex<Vec<ServiceContext>>,
    pub overlaps: AtomicUsize,
    pub cancelled: AtomicUsize,
    pub stubborn_done: AtomicUsize,
}

pub struct Probe {
    pub execute: Execute,
    pub seen: Arc<Seen>,
}

impl Probe {
    pub fn new(execute: Execute) -> (Self, Arc<Seen>) {
        let seen = Arc::new(Seen::default());
        (
            Self {
                execute,
                seen: seen.clone(),
            },
            seen,
        )
    }

    fn enter(&self, ctx: &ServiceContext) {
        let mut contexts = self.seen.contexts.lock();
        let live = contexts.iter().filter(|c| c.is_current()).count();
        self.seen.overlaps.fetch_add(live, Ordering::SeqCst);
        contexts.push(ctx.clone());
    }
}

#[async_trait]
impl ServiceLogic for Probe {
    async fn starting(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.enter(ctx);
        Ok(())
    }

    async fn execute(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.enter(ctx);
        match self.execute {
            Execute::Finish => Ok(()),
            Execute::UntilCancelled => {
                while ctx.sleep(Duration::from_millis(10)).await {}
                self.seen.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(StateError::Canceled)
            }
            Execute::Stubborn(d) => {
                tokio::time::sleep(d).await;
                self.seen.stubborn_done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Execute::Fail => Err(StateError::fail("sensor out of range")),
            Execute::Panic => panic!("agitator jammed"),
        }
    }

    async fn completing(&self, ctx: &ServiceContext) -> Result<(), StateError> {
        self.enter(ctx);
        Ok(())
    }

    async fn idle(&self, _ctx: &ServiceContext) -> Result<(), StateError> {
        Ok(())
    }
}

pub fn set(svc: &Service, leaf: &str, name: &str, v: impl Into<mtpvisor::Value>) {
    let attr = match leaf {
        "mode" => svc.op_src_mode().attribute(name),
        "sm" => svc.state_machine().attribute(name),
        "pc" => svc.procedure_control().attribute(name),
        _ => svc.attribute(name),
    };
    attr.unwrap_or_else(|| panic!("missing attribute {leaf}.{name}"))
        .set_value(v);
}

pub fn operator(svc: &Service) {
    set(svc, "mode", "StateOpOp", true);
}

pub fn command(svc: &Service, cmd: mtpvisor::Command) {
    set(svc, "sm", "CommandOp", cmd.code());
}

pub async fn eventually<F: FnMut() -> bool>(what: &str, mut f: F) {
    let ok = tokio::time::timeout(Duration::from_secs(3), async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok();
    assert!(ok, "timed out waiting for {what}");
}

pub async fn wait_state(svc: &Service, state: State) {
    eventually(&format!("state {state}"), || svc.state() == state).await;
}

/// States announced by `StateChanged` events until `last` is seen.
pub async fn states_until(rx: &mut broadcast::Receiver<Event>, last: State) -> Vec<State> {
    let mut out = Vec::new();
    let collect = async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == EventKind::StateChanged => {
                    let Some(state) = ev.state else { continue };
                    out.push(state);
                    if state == last {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    within(collect).await;
    out
}

pub async fn within<F: Future>(f: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(3), f)
        .await
        .expect("timed out")
}
