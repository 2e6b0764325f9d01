//! # LogWriter: events as `tracing` records.
//!
//! A minimal subscriber that writes incoming [`Event`]s through `tracing`
//! under the `mtpvisor::events` target.
//!
//! ## Example output (with a fmt subscriber installed by the host)
//! ```text
//! INFO  mtpvisor::events: [state] service="dosing" previous=idle state=starting command=start
//! DEBUG mtpvisor::events: [worker-starting] service="dosing" state=starting generation=4
//! WARN  mtpvisor::events: [worker-failed] service="dosing" state=execute err="state handler failed: sensor lost"
//! DEBUG mtpvisor::events: [command-rejected] service="dosing" state=idle command=unhold reason="disabled"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "mtpvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("unknown");
        let state = e.state.map(|s| s.name()).unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::StateChanged => {
                info!(
                    target: TARGET,
                    "[state] service={service:?} previous={} state={state} command={}",
                    e.previous.map(|s| s.name()).unwrap_or("-"),
                    e.command.map(|c| c.name()).unwrap_or("-"),
                );
            }
            EventKind::CommandRejected => {
                debug!(
                    target: TARGET,
                    "[command-rejected] service={service:?} state={state} command={} \
                     reason={reason:?}",
                    e.command.map(|c| c.name()).unwrap_or("-"),
                );
            }
            EventKind::ModeChanged => {
                info!(target: TARGET, "[mode] service={service:?} mode={reason}");
            }
            EventKind::WorkerStarting => {
                debug!(
                    target: TARGET,
                    "[worker-starting] service={service:?} state={state} generation={:?}",
                    e.generation
                );
            }
            EventKind::WorkerStopped => {
                debug!(
                    target: TARGET,
                    "[worker-stopped] service={service:?} state={state} generation={:?}",
                    e.generation
                );
            }
            EventKind::WorkerCanceled => {
                debug!(
                    target: TARGET,
                    "[worker-canceled] service={service:?} state={state} generation={:?}",
                    e.generation
                );
            }
            EventKind::WorkerFailed => {
                warn!(
                    target: TARGET,
                    "[worker-failed] service={service:?} state={state} err={reason:?}"
                );
            }
            EventKind::SubscriberOverflow => {
                warn!(
                    target: TARGET,
                    "[subscriber-overflow] subscriber={service:?} reason={reason:?}"
                );
            }
            EventKind::SubscriberPanicked => {
                warn!(target: TARGET, "[subscriber-panicked] subscriber={service} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
