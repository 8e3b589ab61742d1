//! Per-attempt deadline schedule for retried calls.

use std::time::Duration;

/// Amount each successive attempt's deadline grows by.
pub const DEFAULT_STEP: Duration = Duration::from_millis(1_000);

/// Linear deadline schedule: attempt `i` (from 0) gets `base + i * step`.
///
/// Deadlines grow because each attempt only starts after the previous one
/// has failed or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    step: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, step: Duration) -> Self {
        Self { base, step }
    }

    /// Schedule growing by [`DEFAULT_STEP`] per attempt.
    pub fn linear(base: Duration) -> Self {
        Self::new(base, DEFAULT_STEP)
    }

    /// Deadline of attempt `attempt` (0-based).
    pub fn deadline(&self, attempt: u32) -> Duration {
        self.base.saturating_add(self.step.saturating_mul(attempt))
    }

    /// Deadlines of the first `attempts` attempts, in order.
    pub fn deadlines(&self, attempts: u32) -> impl Iterator<Item = Duration> + '_ {
        (0..attempts).map(move |attempt| self.deadline(attempt))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::linear(Duration::from_millis(crate::config::DEFAULT_HEALTH_CHECK_TIMEOUT_MS))
    }
}
