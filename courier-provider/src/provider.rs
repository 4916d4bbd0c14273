use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_common::EmailPayload;
use serde::{Deserialize, Serialize};

use crate::{
    error::SendFailure,
    health::{HealthCheck, HealthStatus},
    limits::ProviderLimits,
    stats::ProviderStatistics,
};

/// Latency above which a successful health check reports `Degraded`
const DEGRADED_LATENCY: Duration = Duration::from_secs(5);

/// Outcome of a single send attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    /// Identifier assigned by the provider, when it returns one
    pub message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub latency: Duration,
    pub error: Option<SendFailure>,
}

impl SendResult {
    #[must_use]
    pub fn delivered(message_id: Option<String>, latency: Duration) -> Self {
        Self {
            success: true,
            message_id,
            timestamp: Utc::now(),
            latency,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: SendFailure, latency: Duration) -> Self {
        Self {
            success: false,
            message_id: None,
            timestamp: Utc::now(),
            latency,
            error: Some(error),
        }
    }

    /// `true` if this attempt failed in a way another attempt might fix
    pub fn is_retryable(&self) -> bool {
        self.error.as_ref().is_some_and(SendFailure::is_retryable)
    }

    /// Convert into a `Result`, keeping the provider's message id on success.
    ///
    /// # Errors
    ///
    /// Returns the recorded failure if the attempt did not succeed.
    pub fn into_result(self) -> Result<Option<String>, SendFailure> {
        match (self.success, self.error) {
            (true, _) => Ok(self.message_id),
            (false, Some(error)) => Err(error),
            (false, None) => Err(SendFailure::network("Send failed without an error")),
        }
    }
}

/// One outbound transport
///
/// Implementations must never panic on a transport failure; every outcome is
/// reported through [`SendResult`].
#[async_trait]
pub trait EmailProvider: Debug + Send + Sync {
    /// Identifier matching the provider's configuration entry
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Validate and transmit `message`, updating this provider's statistics.
    async fn send(&self, message: &EmailPayload) -> SendResult;

    /// Lightweight reachability/credential check.
    ///
    /// # Errors
    ///
    /// Returns a failure if the provider cannot currently accept mail.
    async fn verify(&self) -> Result<(), SendFailure>;

    /// Time a [`verify`](Self::verify) call and map it to a health status.
    async fn health_check(&self) -> HealthCheck {
        let start = std::time::Instant::now();
        let result = self.verify().await;
        let latency = start.elapsed();

        match result {
            Ok(()) if latency > DEGRADED_LATENCY => HealthCheck {
                status: HealthStatus::Degraded,
                latency,
                error: None,
            },
            Ok(()) => HealthCheck {
                status: HealthStatus::Healthy,
                latency,
                error: None,
            },
            Err(e) => HealthCheck {
                status: HealthStatus::Down,
                latency,
                error: Some(e.to_string()),
            },
        }
    }

    fn limits(&self) -> ProviderLimits;

    fn statistics(&self) -> ProviderStatistics;
}
