use async_trait::async_trait;
use courier_common::EmailPayload;

use crate::error::DeliveryError;

/// A message accepted by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub provider_id: String,
    pub message_id: Option<String>,
}

/// Anything that can deliver one message on behalf of a user.
///
/// The processor only sees this capability; the [`ProviderRegistry`](crate::ProviderRegistry)
/// is the production implementation.
#[async_trait]
pub trait MailSender: std::fmt::Debug + Send + Sync {
    /// Deliver `payload` through `provider_id` (or any provider for
    /// [`AUTO_PROVIDER`](crate::AUTO_PROVIDER)).
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is usable or the chosen one fails.
    async fn send(
        &self,
        payload: &EmailPayload,
        provider_id: &str,
        user_id: &str,
    ) -> Result<Delivered, DeliveryError>;
}
