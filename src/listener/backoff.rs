//! Bounded exponential backoff for reconnection.

use rand::Rng;
use std::time::Duration;

/// Floor applied to a server `retry:` hint.
pub const MIN_RETRY_HINT: Duration = Duration::from_millis(100);

/// Exponential backoff with a retry budget.
///
/// Delay for retry `n` is `initial * 2^(n-1)`, capped at `max`, plus up to
/// 10% jitter (still capped).
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_retries: u32,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff allowing `max_retries` retries.
    pub fn new(initial: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            max,
            max_retries,
            attempt: 0,
        }
    }

    /// Retries used since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Replace the first delay with a server `retry:` hint.
    ///
    /// Hints below [`MIN_RETRY_HINT`] are raised to it.
    pub fn set_initial(&mut self, initial: Duration) {
        self.initial = initial.max(MIN_RETRY_HINT);
    }

    /// Restore the full retry budget.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay before the next retry, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }
        self.attempt += 1;
        let base = self.base_delay(self.attempt);
        let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
        Some((base + jitter).min(self.max))
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}
