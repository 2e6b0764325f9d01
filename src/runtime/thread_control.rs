//! # One live state worker per service.
//!
//! ```text
//! request_state(s, task)        remembers what should run
//! reallocate_running_thread()   requested != running ?
//!     │                              │ yes
//!     │                              ▼
//!     │                 cancel previous token, generation += 1,
//!     │                 spawn run_state(task, ctx{generation, child token})
//!     ▼
//! worker returns ──► Ok        → hooks.on_completed(ctx)    (auto-advance)
//!                ──► Canceled  → nothing
//!                ──► error     → last_exception, hooks.on_failed(ctx, err)
//!                                (superseded workers: logged only)
//! ```
//!
//! Every worker token is a child of the service root token, so
//! [`ThreadControl::shutdown`] stops whatever is running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::context::WorkerContext;
use super::runner::{run_state, worker_event};
use super::task::StateTaskRef;
use crate::control::State;
use crate::error::StateError;
use crate::events::{Bus, EventKind};

/// Reactions to a finished worker, implemented by the owning service.
pub trait WorkerHooks: Send + Sync + 'static {
    /// Worker returned `Ok(())`.
    fn on_completed(&self, ctx: &WorkerContext);

    /// Current worker returned an error other than `Canceled`.
    fn on_failed(&self, ctx: &WorkerContext, err: &StateError);
}

struct Worker {
    state: State,
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    requested: Option<(State, StateTaskRef)>,
    running: Option<State>,
    worker: Option<Worker>,
    generation: u64,
    last_exception: Option<StateError>,
}

/// Worker scheduler of one service.
pub struct ThreadControl {
    me: Weak<ThreadControl>,
    service: Arc<str>,
    handle: Handle,
    root: CancellationToken,
    bus: Bus,
    current: Arc<AtomicU64>,
    hooks: Arc<dyn WorkerHooks>,
    slot: Mutex<Slot>,
}

impl ThreadControl {
    pub fn new(
        service: impl Into<Arc<str>>,
        handle: Handle,
        bus: Bus,
        hooks: Arc<dyn WorkerHooks>,
    ) -> Arc<Self> {
        let service = service.into();
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            service,
            handle,
            root: CancellationToken::new(),
            bus,
            current: Arc::new(AtomicU64::new(0)),
            hooks,
            slot: Mutex::new(Slot::default()),
        })
    }

    /// Remembers the state (and its task) that should run next.
    pub fn request_state(&self, state: State, task: StateTaskRef) {
        debug!(service = %self.service, state = %state, "state requested");
        self.slot.lock().requested = Some((state, task));
    }

    /// Spawns a worker for the requested state unless it is already running.
    ///
    /// An idle worker that has already returned is respawned when idle is
    /// requested again.
    pub fn reallocate_running_thread(&self) {
        let mut slot = self.slot.lock();
        let Some((state, task)) = slot.requested.clone() else {
            return;
        };

        let idle_finished = state == State::Idle
            && slot
                .worker
                .as_ref()
                .map_or(true, |w| w.handle.is_finished());
        if slot.running == Some(state) && !idle_finished {
            return;
        }

        if let Some(prev) = slot.worker.take() {
            prev.token.cancel();
            debug!(
                service = %self.service,
                state = %prev.state,
                generation = prev.generation,
                "worker superseded"
            );
        }

        slot.generation += 1;
        let generation = slot.generation;
        self.current.store(generation, Ordering::Release);

        let token = self.root.child_token();
        let ctx = WorkerContext::new(
            self.service.clone(),
            state,
            generation,
            token.clone(),
            self.current.clone(),
        );
        self.bus.publish(worker_event(EventKind::WorkerStarting, &ctx));

        let bus = self.bus.clone();
        let me = self.me.clone();
        let handle = self.handle.spawn(async move {
            let res = run_state(task.as_ref(), ctx.clone(), &bus).await;
            if let Some(tc) = me.upgrade() {
                tc.finish(&ctx, res);
            }
        });

        slot.worker = Some(Worker {
            state,
            generation,
            token,
            handle,
        });
        slot.running = Some(state);
    }

    fn finish(&self, ctx: &WorkerContext, res: Result<(), StateError>) {
        match res {
            Ok(()) => self.hooks.on_completed(ctx),
            Err(StateError::Canceled) => {}
            Err(err) => {
                self.slot.lock().last_exception = Some(err.clone());
                if ctx.is_current() {
                    self.hooks.on_failed(ctx, &err);
                } else {
                    warn!(
                        service = %self.service,
                        state = %ctx.state(),
                        generation = ctx.generation(),
                        error = %err,
                        "superseded worker failed"
                    );
                }
            }
        }
    }

    /// Cancels the live worker without spawning a successor.
    pub fn cancel_running_thread(&self) {
        let mut slot = self.slot.lock();
        if let Some(w) = slot.worker.take() {
            w.token.cancel();
            debug!(
                service = %self.service,
                state = %w.state,
                generation = w.generation,
                "worker cancelled"
            );
        }
        slot.running = None;
    }

    /// True if `generation` belongs to the live, uncancelled worker.
    pub fn is_current(&self, generation: u64) -> bool {
        let slot = self.slot.lock();
        slot.worker
            .as_ref()
            .is_some_and(|w| w.generation == generation && !w.token.is_cancelled())
    }

    /// True while a spawned worker has not returned yet.
    pub fn has_live_worker(&self) -> bool {
        self.slot
            .lock()
            .worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    pub fn running_state(&self) -> Option<State> {
        self.slot.lock().running
    }

    pub fn requested_state(&self) -> Option<State> {
        self.slot.lock().requested.as_ref().map(|(s, _)| *s)
    }

    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    pub fn last_exception(&self) -> Option<StateError> {
        self.slot.lock().last_exception.clone()
    }

    /// Parent of every worker token; cancelled by [`ThreadControl::shutdown`].
    pub fn root_token(&self) -> &CancellationToken {
        &self.root
    }

    /// Cancels the root token: the live worker and all future ones.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.cancel_running_thread();
    }
}

impl std::fmt::Debug for ThreadControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("ThreadControl")
            .field("service", &self.service)
            .field("running", &slot.running)
            .field("generation", &slot.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::runtime::TaskFn;

    #[derive(Default)]
    struct Recorder {
        completed: Mutex<Vec<(State, u64)>>,
        failed: Mutex<Vec<String>>,
    }

    impl WorkerHooks for Recorder {
        fn on_completed(&self, ctx: &WorkerContext) {
            if ctx.is_current() {
                self.completed.lock().push((ctx.state(), ctx.generation()));
            }
        }

        fn on_failed(&self, _ctx: &WorkerContext, err: &StateError) {
            self.failed.lock().push(err.as_label().to_string());
        }
    }

    fn setup() -> (Arc<Recorder>, Arc<ThreadControl>) {
        let hooks = Arc::new(Recorder::default());
        let tc = ThreadControl::new("svc", Handle::current(), Bus::new(64), hooks.clone());
        (hooks, tc)
    }

    async fn eventually(mut f: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !f() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reallocate_keeps_one_live_worker() {
        let (_hooks, tc) = setup();
        let seen: Arc<Mutex<Vec<WorkerContext>>> = Arc::default();
        let overlaps = Arc::new(AtomicUsize::new(0));

        for state in [State::Starting, State::Execute, State::Holding] {
            let (task_seen, task_overlaps) = (seen.clone(), overlaps.clone());
            let task: StateTaskRef = TaskFn::arc(state.name(), move |ctx: WorkerContext| {
                let (seen, overlaps) = (task_seen.clone(), task_overlaps.clone());
                async move {
                    {
                        let mut seen = seen.lock();
                        let live = seen.iter().filter(|c| c.is_current()).count();
                        overlaps.fetch_add(live, Ordering::SeqCst);
                        seen.push(ctx.clone());
                    }
                    ctx.cancelled().await;
                    Err(StateError::Canceled)
                }
            });
            let expected = seen.lock().len() + 1;
            tc.request_state(state, task);
            tc.reallocate_running_thread();
            eventually(|| seen.lock().len() == expected).await;
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(tc.running_state(), Some(State::Holding));
        assert_eq!(tc.generation(), 3);
        assert!(!seen.lock()[0].is_current());
        assert!(seen.lock()[2].is_current());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_state_is_not_respawned() {
        let (_hooks, tc) = setup();
        let task: StateTaskRef = TaskFn::arc("execute", |ctx: WorkerContext| async move {
            ctx.cancelled().await;
            Err(StateError::Canceled)
        });
        tc.request_state(State::Execute, task.clone());
        tc.reallocate_running_thread();
        tc.request_state(State::Execute, task);
        tc.reallocate_running_thread();
        assert_eq!(tc.generation(), 1);
        assert!(tc.is_current(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finished_idle_worker_is_respawned() {
        let (hooks, tc) = setup();
        let task: StateTaskRef = TaskFn::arc("idle", |_ctx: WorkerContext| async move { Ok(()) });
        tc.request_state(State::Idle, task.clone());
        tc.reallocate_running_thread();
        eventually(|| hooks.completed.lock().len() == 1 && !tc.has_live_worker()).await;

        tc.request_state(State::Idle, task);
        tc.reallocate_running_thread();
        eventually(|| hooks.completed.lock().len() == 2).await;
        assert_eq!(tc.generation(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_is_stored_and_routed() {
        let (hooks, tc) = setup();
        let task: StateTaskRef = TaskFn::arc("execute", |_ctx: WorkerContext| async move {
            Err(StateError::fail("bad sensor"))
        });
        tc.request_state(State::Execute, task);
        tc.reallocate_running_thread();

        eventually(|| !hooks.failed.lock().is_empty()).await;
        assert_eq!(hooks.failed.lock()[0], "state_failed");
        assert_eq!(tc.last_exception(), Some(StateError::fail("bad sensor")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_cancels_live_worker() {
        let (_hooks, tc) = setup();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let task: StateTaskRef = TaskFn::arc("execute", move |ctx: WorkerContext| {
            let s = s.clone();
            async move {
                ctx.cancelled().await;
                s.fetch_add(1, Ordering::SeqCst);
                Err(StateError::Canceled)
            }
        });
        tc.request_state(State::Execute, task);
        tc.reallocate_running_thread();
        tc.shutdown();

        eventually(|| seen.load(Ordering::SeqCst) == 1).await;
        assert_eq!(tc.running_state(), None);
    }
}
