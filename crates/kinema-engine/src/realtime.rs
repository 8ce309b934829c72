//! Wall-clock pacing for a [`Runtime`].
//!
//! [`RealtimeRuntime`] moves a runtime onto a tokio task that ticks once
//! per control period and publishes each completed frame.
//!
//! # Architecture
//!
//! ```text
//! UI / render callback          Loop task
//!     |                             |
//!     |--handle().drag()----------->| runtime.tick()  (drains requests)
//!     |   [crossbeam unbounded]     | frames.send_replace(frame)
//!     |<--frames.borrow()-----------| sleep(period - elapsed)
//!     |   [tokio watch]             | stop flag checked
//!     |                             |
//!     |--stop().await-------------->| loop exits, returns Runtime
//! ```
//!
//! An overrun tick is followed immediately by the next one; the deficit
//! is not carried forward.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::frame::BodyFrame;
use crate::requests::ControlHandle;
use crate::runtime::Runtime;

// ── LoopStats ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    overruns: AtomicU64,
}

/// Counters for a running loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Loop iterations, including ticks that did nothing because the
    /// runtime was stopped.
    pub ticks: u64,
    /// Iterations that took longer than the control period.
    pub overruns: u64,
}

// ── RealtimeRuntime ──────────────────────────────────────────────

/// Raises the stop flag when dropped.
#[derive(Debug)]
struct StopOnDrop(Arc<AtomicBool>);

impl StopOnDrop {
    fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.raise();
    }
}

/// A [`Runtime`] ticking in real time on a tokio task.
///
/// Dropping without calling [`stop`](Self::stop) signals the task to
/// exit; the runtime is then dropped with it.
pub struct RealtimeRuntime {
    stop_flag: StopOnDrop,
    counters: Arc<Counters>,
    frames: watch::Receiver<Option<BodyFrame>>,
    handle: ControlHandle,
    task: JoinHandle<Runtime>,
}

impl RealtimeRuntime {
    /// Spawn the loop on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(runtime: Runtime) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());
        let (tx, frames) = watch::channel(runtime.frame().cloned());
        let handle = runtime.handle();
        let task = tokio::spawn(drive(runtime, stop_flag.clone(), tx, counters.clone()));
        Self {
            stop_flag: StopOnDrop(stop_flag),
            counters,
            frames,
            handle,
            task,
        }
    }

    /// Sender for drag and reset requests.
    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// A receiver that sees every published frame.
    pub fn frames(&self) -> watch::Receiver<Option<BodyFrame>> {
        self.frames.clone()
    }

    /// The most recent completed frame.
    pub fn latest_frame(&self) -> Option<BodyFrame> {
        self.frames.borrow().clone()
    }

    /// Loop counters so far.
    pub fn stats(&self) -> LoopStats {
        LoopStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            overruns: self.counters.overruns.load(Ordering::Relaxed),
        }
    }

    /// Stop after the current tick and take the runtime back.
    ///
    /// # Errors
    ///
    /// Returns the join error if the loop task panicked.
    pub async fn stop(self) -> Result<Runtime, JoinError> {
        let Self {
            stop_flag, task, ..
        } = self;
        stop_flag.raise();
        task.await
    }
}

impl std::fmt::Debug for RealtimeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeRuntime")
            .field("stopping", &self.stop_flag.0.load(Ordering::Relaxed))
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

async fn drive(
    mut runtime: Runtime,
    stop_flag: Arc<AtomicBool>,
    frames: watch::Sender<Option<BodyFrame>>,
    counters: Arc<Counters>,
) -> Runtime {
    loop {
        if stop_flag.load(Ordering::Acquire) {
            break;
        }
        let started = Instant::now();

        let metrics = runtime.tick();
        if metrics.stepped() || metrics.reset {
            frames.send_replace(runtime.frame().cloned());
        }
        counters.ticks.fetch_add(1, Ordering::Relaxed);

        let budget = runtime.control_period();
        match budget.checked_sub(started.elapsed()) {
            Some(remaining) => tokio::time::sleep(remaining).await,
            None => {
                counters.overruns.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    budget_us = budget.as_micros() as u64,
                    tick_us = metrics.total_us,
                    "tick overran its control period"
                );
                tokio::task::yield_now().await;
            }
        }
    }
    runtime
}
