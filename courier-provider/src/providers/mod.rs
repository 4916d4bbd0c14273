//! Concrete adapters and the configuration that selects between them.

mod http;
mod log;

use std::sync::Arc;

pub use http::{HttpApiConfig, HttpApiProvider};
pub use log::LogProvider;
use serde::Deserialize;

use crate::{error::ProviderError, provider::EmailProvider};

/// Which adapter backs a configured provider
///
/// ```text
/// Http((
///     endpoint: "https://api.example.com/v1/emails",
///     api_key: "env:EXAMPLE_API_KEY",
/// ))
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum ProviderSettings {
    /// A JSON-over-HTTPS transactional email API
    Http(HttpApiConfig),
    /// Write messages to the log instead of sending them
    Log,
}

impl ProviderSettings {
    /// Build the adapter for the provider `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or reference an unset
    /// environment variable.
    pub fn build(&self, id: &str, name: &str) -> Result<Arc<dyn EmailProvider>, ProviderError> {
        Ok(match self {
            Self::Http(config) => Arc::new(HttpApiProvider::new(id, name, config)?),
            Self::Log => Arc::new(LogProvider::new(id, name)),
        })
    }
}
