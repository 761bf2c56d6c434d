//! Retry scheduling: deterministic exponential backoff.

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;

/// Backoff parameters for failed attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 300_000,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }

    /// Delay before the retry following `attempt`, in milliseconds.
    ///
    /// `initial * 2^(attempt-1)`, clamped to `[initial, max]`. Attempts
    /// below 1 are treated as 1.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let attempt = attempt.max(1);
        let factor = 1u64 << (attempt - 1).min(63);
        let raw = self.initial_backoff_ms.saturating_mul(factor);
        raw.min(self.max_backoff_ms).max(self.initial_backoff_ms)
    }

    /// Instant of the next attempt given the current one.
    pub fn next_attempt_at(&self, now: DateTime<Utc>, attempt: u32) -> DateTime<Utc> {
        now + Duration::milliseconds(self.backoff_ms(attempt) as i64)
    }
}
