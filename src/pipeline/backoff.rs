//! Exponential backoff between failed vision attempts.
//!
//! `delay(n) = base × 2^(n−1)` for the `n`-th failed attempt (1-indexed).
//! With the 5 s default base and 3 attempts the waits are 5 s then 10 s; the
//! third failure is terminal and does not wait.

use std::time::Duration;

/// Upper bound on a single backoff wait.
pub const MAX_BACKOFF: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: MAX_BACKOFF,
        }
    }

    /// Cap individual waits at `max` instead of [`MAX_BACKOFF`].
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Wait after the `attempt`-th failure (1-indexed; 0 is treated as 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.max(1) - 1;
        let factor = 2u32.checked_pow(exp).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// The waits a caller with `max_attempts` total attempts can incur.
    pub fn schedule(&self, max_attempts: u32) -> impl Iterator<Item = Duration> + '_ {
        (1..max_attempts).map(move |attempt| self.delay(attempt))
    }
}
