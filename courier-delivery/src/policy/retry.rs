//! Backoff between delivery attempts.
//!
//! A job that fails for the k-th time waits `unit * base^k` before it becomes
//! due again. With the defaults that is 3, 9 and 27 minutes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Growth factor of the delay
    ///
    /// Default: 3
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base: u32,

    /// Delay multiplied by `backoff_base^retry_count` (in seconds)
    ///
    /// Default: 60 seconds (1 minute)
    #[serde(default = "defaults::backoff_unit_secs")]
    pub backoff_unit_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_base: defaults::backoff_base(),
            backoff_unit_secs: defaults::backoff_unit_secs(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay after the `retry_count`-th failure, saturating on overflow
    #[must_use]
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = u64::from(self.backoff_base)
            .checked_pow(retry_count)
            .unwrap_or(u64::MAX);
        let secs = self.backoff_unit_secs.saturating_mul(factor);

        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// When a job that just failed for the `retry_count`-th time is due again
    #[must_use]
    pub fn next_attempt(&self, now: DateTime<Utc>, retry_count: u32) -> DateTime<Utc> {
        now.checked_add_signed(self.backoff(retry_count))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

mod defaults {
    pub const fn backoff_base() -> u32 {
        3
    }

    pub const fn backoff_unit_secs() -> u64 {
        60
    }
}
