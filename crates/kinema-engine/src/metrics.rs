//! Per-tick metrics for the control loop.
//!
//! [`TickMetrics`] records what one [`Runtime::tick`](crate::Runtime::tick)
//! did, for logging and for the realtime driver's overrun accounting.

/// What happened during a single tick.
///
/// Durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Wall-clock time for the whole tick.
    pub total_us: u64,
    /// Physics substeps taken. Zero for reset ticks and idle ticks.
    pub substeps: u32,
    /// The tick performed a reset instead of stepping.
    pub reset: bool,
    /// A new inference call was started.
    pub inference_dispatched: bool,
    /// A completed inference result was adopted as the held action.
    pub inference_adopted: bool,
    /// An inference call completed with an error or an unusable result.
    pub inference_failed: bool,
    /// A completed result was dropped because a reset happened after it
    /// was dispatched.
    pub inference_discarded: bool,
    /// Observation building failed; the policy was dropped and the
    /// runtime stopped without stepping.
    pub observation_failed: bool,
}

impl TickMetrics {
    /// Whether the tick advanced simulation time.
    pub fn stepped(&self) -> bool {
        self.substeps > 0
    }
}
