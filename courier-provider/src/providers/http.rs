//! Adapter for JSON-over-HTTPS transactional email APIs.
//!
//! The message is posted as JSON with bearer authentication. The provider's
//! message id is read from an `id` or `message_id` field of the response.

use std::time::Duration;

use async_trait::async_trait;
use courier_common::{EmailPayload, outgoing};
use serde::Deserialize;

use crate::{
    base::ProviderCore,
    error::{FailureCode, ProviderError, SendFailure},
    limits::ProviderLimits,
    provider::{EmailProvider, SendResult},
    stats::ProviderStatistics,
};

/// Longest error body kept in a failure message
const MAX_ERROR_BODY: usize = 256;

const fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpApiConfig {
    /// URL the message is posted to
    pub endpoint: String,

    /// Bearer token. `env:NAME` reads it from the environment variable `NAME`.
    pub api_key: String,

    /// URL probed by `verify`. Without one, verification always succeeds.
    #[serde(default)]
    pub verify_endpoint: Option<String>,

    /// Per-request timeout, covering connect, send and response
    ///
    /// Default: 30 seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub limits: ProviderLimits,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(alias = "message_id", alias = "messageId")]
    id: Option<String>,
}

#[derive(Debug)]
pub struct HttpApiProvider {
    core: ProviderCore,
    client: reqwest::Client,
    endpoint: String,
    verify_endpoint: Option<String>,
    api_key: String,
}

impl HttpApiProvider {
    /// # Errors
    ///
    /// Returns an error if an endpoint is not an `http(s)` URL, the API key
    /// references an unset environment variable, or the client cannot be built.
    pub fn new(id: &str, name: &str, config: &HttpApiConfig) -> Result<Self, ProviderError> {
        for endpoint in std::iter::once(&config.endpoint).chain(&config.verify_endpoint) {
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(ProviderError::InvalidConfiguration {
                    provider: id.to_string(),
                    reason: format!("endpoint {endpoint:?} is not an http(s) URL"),
                });
            }
        }

        let api_key = resolve_secret(&config.api_key)?;
        if api_key.is_empty() {
            return Err(ProviderError::InvalidConfiguration {
                provider: id.to_string(),
                reason: "api_key is empty".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            core: ProviderCore::new(id, name, config.limits.clone()),
            client,
            endpoint: config.endpoint.clone(),
            verify_endpoint: config.verify_endpoint.clone(),
            api_key,
        })
    }

    async fn transmit(&self, message: &EmailPayload) -> Result<Option<String>, SendFailure> {
        outgoing!(
            provider = %self.core.id(),
            endpoint = %self.endpoint,
            recipients = message.recipient_count(),
            "Posting message to provider"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendFailure::from_status(
                status.as_u16(),
                error_message(status, &body),
            ));
        }

        // The provider has accepted the message; an unreadable body only
        // loses the message id
        match response.text().await {
            Ok(body) => Ok(serde_json::from_str::<ApiResponse>(&body)
                .ok()
                .and_then(|response| response.id)),
            Err(err) => {
                outgoing!(
                    level = WARN,
                    provider = %self.core.id(),
                    error = %err,
                    "Accepted response body could not be read"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl EmailProvider for HttpApiProvider {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(provider = %self.core.id()))]
    async fn send(&self, message: &EmailPayload) -> SendResult {
        self.core.send(message, || self.transmit(message)).await
    }

    async fn verify(&self) -> Result<(), SendFailure> {
        let Some(url) = &self.verify_endpoint else {
            return Ok(());
        };

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SendFailure::from_status(
                status.as_u16(),
                error_message(status, &body),
            ))
        }
    }

    fn limits(&self) -> ProviderLimits {
        self.core.limits().clone()
    }

    fn statistics(&self) -> ProviderStatistics {
        self.core.statistics()
    }
}

/// Map a client error onto the retry classification
fn classify(error: &reqwest::Error) -> SendFailure {
    if error.is_timeout() {
        SendFailure::timeout(error.to_string())
    } else if let Some(status) = error.status() {
        SendFailure::from_status(status.as_u16(), error.to_string())
    } else if error.is_builder() {
        SendFailure::new(FailureCode::Configuration, error.to_string(), false)
    } else {
        SendFailure::network(error.to_string())
    }
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status.to_string();
    }

    let end = body
        .char_indices()
        .nth(MAX_ERROR_BODY)
        .map_or(body.len(), |(index, _)| index);
    format!("{status}: {}", &body[..end])
}

fn resolve_secret(value: &str) -> Result<String, ProviderError> {
    value.strip_prefix("env:").map_or_else(
        || Ok(value.to_string()),
        |name| {
            std::env::var(name).map_err(|_| ProviderError::MissingEnvironment(name.to_string()))
        },
    )
}
