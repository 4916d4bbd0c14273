//! Errors raised by the queue and by the delivery path.
//!
//! Queue errors are answered to the caller straight away. Delivery errors end
//! up on the job, and the processor decides between retrying and failing it.

use courier_common::ValidationError;
use courier_provider::SendFailure;
use thiserror::Error;

use crate::types::JobStatus;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The payload would be rejected by every provider
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] ValidationError),

    #[error("Job not found: {0}")]
    NotFound(String),

    /// Only pending jobs can be cancelled
    #[error("Job {id} is {status} and cannot be cancelled")]
    NotCancellable { id: String, status: JobStatus },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Every provider is inactive, over its daily limit or down
    #[error("NO_PROVIDER_AVAILABLE: No available email provider")]
    NoProvider,

    /// The provider reported a failed send
    #[error("{provider}: {failure}")]
    Failed {
        provider: String,
        failure: SendFailure,
    },

    #[error("Provider {0} is registered twice")]
    DuplicateProvider(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl DeliveryError {
    /// Returns `true` if a later attempt may succeed.
    ///
    /// A missing provider counts as retryable: a limit reset or a passing
    /// health check can bring one back before the next tick.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NoProvider => true,
            Self::Failed { failure, .. } => failure.retryable,
            Self::DuplicateProvider(_) | Self::UnknownProvider(_) => false,
        }
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }
}
