//! Provider adapters: the uniform interface courier uses to hand one message
//! to one outbound transport.
//!
//! Every adapter:
//! - validates the message locally before any network traffic
//! - classifies failures as retryable or not
//! - keeps its own rolling [`ProviderStatistics`]
//!
//! The shared bookkeeping lives in [`ProviderCore`]; an adapter only
//! implements the transport call itself.

mod base;
mod error;
mod health;
mod limits;
mod provider;
pub mod providers;
mod stats;

pub use base::ProviderCore;
pub use error::{FailureCode, ProviderError, SendFailure};
pub use health::{HealthCheck, HealthStatus};
pub use limits::ProviderLimits;
pub use provider::{EmailProvider, SendResult};
pub use providers::{HttpApiConfig, HttpApiProvider, LogProvider, ProviderSettings};
pub use stats::{ErrorRecord, ProviderStatistics, RECENT_ERROR_CAPACITY};
