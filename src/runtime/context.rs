//! # Cancellation context handed to every state worker.
//!
//! A worker is superseded as soon as the service leaves the state it was
//! spawned for. [`WorkerContext`] lets the handler notice that and return:
//!
//! ```text
//! loop {
//!     ctx.checkpoint()?;              // Err(Canceled) once superseded
//!     do_one_cycle().await;
//!     if !ctx.sleep(period).await {   // false when cancelled mid-sleep
//!         return Err(StateError::Canceled);
//!     }
//! }
//! ```
//!
//! Cancellation is cooperative. A handler that never polls keeps running
//! (and may keep writing attributes) after its successor started; only its
//! auto-advance is discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::control::State;
use crate::error::StateError;

/// Identity and cancellation handle of one state worker.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    service: Arc<str>,
    state: State,
    generation: u64,
    token: CancellationToken,
    current: Arc<AtomicU64>,
}

impl WorkerContext {
    pub(crate) fn new(
        service: Arc<str>,
        state: State,
        generation: u64,
        token: CancellationToken,
        current: Arc<AtomicU64>,
    ) -> Self {
        Self {
            service,
            state,
            generation,
            token,
            current,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// State this worker was spawned for.
    pub fn state(&self) -> State {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True while this worker is the live one and has not been cancelled.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.current.load(Ordering::Acquire) == self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_current()
    }

    /// Resolves once the worker is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Sleeps for `d`; returns `false` if cancelled first.
    pub async fn sleep(&self, d: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(d) => self.is_current(),
        }
    }

    /// `Err(StateError::Canceled)` once superseded, for use with `?`.
    pub fn checkpoint(&self) -> Result<(), StateError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(StateError::Canceled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(generation: u64, current: &Arc<AtomicU64>) -> WorkerContext {
        WorkerContext::new(
            "svc".into(),
            State::Execute,
            generation,
            CancellationToken::new(),
            current.clone(),
        )
    }

    #[test]
    fn test_superseded_generation_is_not_current() {
        let current = Arc::new(AtomicU64::new(3));
        let c = ctx(3, &current);
        assert!(c.checkpoint().is_ok());
        current.store(4, Ordering::Release);
        assert_eq!(c.checkpoint(), Err(StateError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_returns_early_on_cancel() {
        let current = Arc::new(AtomicU64::new(1));
        let c = ctx(1, &current);
        let token = c.token().clone();
        let sleeper = tokio::spawn({
            let c = c.clone();
            async move { c.sleep(Duration::from_secs(60)).await }
        });
        tokio::task::yield_now().await;
        token.cancel();
        assert!(!sleeper.await.unwrap());
        assert!(c.is_cancelled());
    }
}
