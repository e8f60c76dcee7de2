//! # Reconnect Backoff
//!
//! Exponential backoff used between change feed reconnect attempts:
//! `min(base * 2^k, cap)` for the `k`-th wait (0-indexed) of a failure run.
//! No jitter is applied; one consumer per collection means there is no herd
//! to spread out.

use std::time::Duration;

/// Exponential backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    base: Duration,
    /// Upper bound for any delay
    cap: Duration,
}

impl BackoffPolicy {
    /// Create a policy; a cap below the base is raised to the base
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Delay for the `attempt`-th wait (0-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// The full delay sequence, starting at attempt 0
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0u32..).map(move |attempt| self.delay(attempt))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10))
    }
}
