//! Rolling per-provider statistics.

use std::{collections::VecDeque, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FailureCode, SendFailure};

/// Number of recent errors kept per provider
pub const RECENT_ERROR_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub code: FailureCode,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatistics {
    /// Attempts made through this provider, including locally rejected ones
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// `successful / total`, 0 before the first attempt
    pub success_rate: f64,
    /// Mean latency of transport calls, in milliseconds
    pub average_latency_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
    /// Newest last, bounded by [`RECENT_ERROR_CAPACITY`]
    pub recent_errors: VecDeque<ErrorRecord>,
    #[serde(skip)]
    latency_samples: u64,
}

impl ProviderStatistics {
    pub fn record_success(&mut self, at: DateTime<Utc>, latency: Duration) {
        self.total += 1;
        self.successful += 1;
        self.last_used = Some(at);
        self.record_latency(latency);
        self.update_success_rate();
    }

    /// Record a failed attempt. `latency` is `None` when nothing was sent.
    pub fn record_failure(
        &mut self,
        at: DateTime<Utc>,
        latency: Option<Duration>,
        failure: &SendFailure,
    ) {
        self.total += 1;
        self.failed += 1;
        self.last_used = Some(at);
        if let Some(latency) = latency {
            self.record_latency(latency);
        }
        self.update_success_rate();

        if self.recent_errors.len() == RECENT_ERROR_CAPACITY {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(ErrorRecord {
            timestamp: at,
            code: failure.code,
            message: failure.message.clone(),
        });
    }

    #[allow(clippy::cast_precision_loss, reason = "Counts stay far below 2^52")]
    fn record_latency(&mut self, latency: Duration) {
        self.latency_samples += 1;
        let sample = latency.as_secs_f64() * 1000.0;
        self.average_latency_ms +=
            (sample - self.average_latency_ms) / self.latency_samples as f64;
    }

    #[allow(clippy::cast_precision_loss, reason = "Counts stay far below 2^52")]
    fn update_success_rate(&mut self) {
        self.success_rate = if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        };
    }
}
