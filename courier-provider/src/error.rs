//! Error types for provider adapters.
//!
//! [`SendFailure`] is the outcome of a failed send attempt and carries the
//! retry classification the queue acts on. [`ProviderError`] covers building
//! an adapter from configuration.

use std::fmt::{self, Display};

use courier_common::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable category of a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// The message was refused locally and never transmitted
    Validation,
    /// The message exceeds a provider limit (recipients, size)
    LimitExceeded,
    /// Connection could not be established or was dropped
    Network,
    /// The transport did not answer in time
    Timeout,
    /// The provider answered with a non-success HTTP status
    Http(u16),
    /// The provider's credentials or configuration were rejected
    Configuration,
}

impl Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => f.write_str("VALIDATION_ERROR"),
            Self::LimitExceeded => f.write_str("LIMIT_EXCEEDED"),
            Self::Network => f.write_str("NETWORK_ERROR"),
            Self::Timeout => f.write_str("TIMEOUT"),
            Self::Http(status) => write!(f, "HTTP_{status}"),
            Self::Configuration => f.write_str("CONFIGURATION_ERROR"),
        }
    }
}

/// A failed send attempt
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct SendFailure {
    pub code: FailureCode,
    pub message: String,
    pub retryable: bool,
}

impl SendFailure {
    #[must_use]
    pub fn new(code: FailureCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }

    /// Classify an HTTP status returned by a provider API.
    ///
    /// - 429 and 5xx are retryable
    /// - every other status is permanent
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let retryable = status == 429 || (500..600).contains(&status);
        Self::new(FailureCode::Http(status), message, retryable)
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureCode::Network, message, true)
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureCode::Timeout, message, true)
    }

    #[must_use]
    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(FailureCode::LimitExceeded, message, false)
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<ValidationError> for SendFailure {
    fn from(error: ValidationError) -> Self {
        Self::new(FailureCode::Validation, error.to_string(), false)
    }
}

/// Errors building a provider from configuration
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid configuration for provider {provider}: {reason}")]
    InvalidConfiguration { provider: String, reason: String },

    #[error("Environment variable {0} referenced by provider configuration is not set")]
    MissingEnvironment(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
