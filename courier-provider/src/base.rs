//! Bookkeeping shared by every adapter.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use chrono::Utc;
use courier_common::{EmailPayload, internal};
use parking_lot::Mutex;

use crate::{
    error::SendFailure, limits::ProviderLimits, provider::SendResult, stats::ProviderStatistics,
};

/// Identity, limits and statistics of one adapter.
///
/// [`send`](Self::send) wraps an adapter's transport call: the message is
/// checked first, the call is timed, and the outcome is recorded whether it
/// succeeded or not.
#[derive(Debug)]
pub struct ProviderCore {
    id: String,
    name: String,
    limits: ProviderLimits,
    stats: Mutex<ProviderStatistics>,
}

impl ProviderCore {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, limits: ProviderLimits) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            limits,
            stats: Mutex::new(ProviderStatistics::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn limits(&self) -> &ProviderLimits {
        &self.limits
    }

    pub fn statistics(&self) -> ProviderStatistics {
        self.stats.lock().clone()
    }

    /// Local checks run before any transmission.
    ///
    /// # Errors
    ///
    /// Returns a non-retryable failure if the message is malformed or exceeds
    /// this provider's limits.
    pub fn check(&self, message: &EmailPayload) -> Result<(), SendFailure> {
        message.validate()?;

        let recipients = message.recipient_count();
        if recipients > self.limits.max_recipients {
            return Err(SendFailure::limit_exceeded(format!(
                "{recipients} recipients exceeds the limit of {}",
                self.limits.max_recipients
            )));
        }

        let size = u64::try_from(message.body_size()).unwrap_or(u64::MAX);
        if size > self.limits.max_email_size {
            return Err(SendFailure::limit_exceeded(format!(
                "Message size {size} bytes exceeds the limit of {} bytes",
                self.limits.max_email_size
            )));
        }

        Ok(())
    }

    /// Check `message`, run `transport`, and record the outcome.
    ///
    /// `transport` resolves to the provider's message id on success.
    pub async fn send<F, Fut>(&self, message: &EmailPayload, transport: F) -> SendResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, SendFailure>>,
    {
        if let Err(failure) = self.check(message) {
            internal!(
                level = WARN,
                provider = %self.id,
                error = %failure,
                "Message rejected before transmission"
            );
            self.stats.lock().record_failure(Utc::now(), None, &failure);
            return SendResult::failed(failure, Duration::ZERO);
        }

        let start = Instant::now();
        let outcome = transport().await;
        let latency = start.elapsed();

        match outcome {
            Ok(message_id) => {
                self.stats.lock().record_success(Utc::now(), latency);
                SendResult::delivered(message_id, latency)
            }
            Err(failure) => {
                self.stats
                    .lock()
                    .record_failure(Utc::now(), Some(latency), &failure);
                SendResult::failed(failure, latency)
            }
        }
    }
}
