//! Errors raised while checking an outbound message locally.

use thiserror::Error;

/// Reasons a message is refused before it reaches any transport.
///
/// These are never retried: sending the same payload again cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message has no recipients")]
    NoRecipients,

    #[error("Message subject is empty")]
    EmptySubject,

    #[error("Message has neither a text nor an HTML body")]
    EmptyBody,

    #[error("Message has no sender address")]
    MissingSender,

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}
