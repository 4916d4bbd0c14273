//! Sending through the registry, with one failover on a permanent failure

use async_trait::async_trait;
use courier_common::{EmailPayload, internal};
use courier_provider::SendFailure;

use super::{ProviderRegistry, Selection};
use crate::{
    error::DeliveryError,
    sender::{Delivered, MailSender},
};

impl ProviderRegistry {
    async fn attempt(
        &self,
        selection: &Selection,
        payload: &EmailPayload,
    ) -> Result<Delivered, SendFailure> {
        match selection.provider.send(payload).await.into_result() {
            Ok(message_id) => {
                self.record_success(&selection.id);
                Ok(Delivered {
                    provider_id: selection.id.clone(),
                    message_id,
                })
            }
            Err(failure) => {
                self.release(&selection.id);
                self.record_failure(&selection.id, &failure);
                Err(failure)
            }
        }
    }
}

#[async_trait]
impl MailSender for ProviderRegistry {
    #[tracing::instrument(level = "debug", skip_all, fields(requested = %provider_id, user_id = %user_id))]
    async fn send(
        &self,
        payload: &EmailPayload,
        provider_id: &str,
        user_id: &str,
    ) -> Result<Delivered, DeliveryError> {
        let primary = self
            .claim_provider(provider_id, user_id)
            .await
            .ok_or(DeliveryError::NoProvider)?;

        let failure = match self.attempt(&primary, payload).await {
            Ok(delivered) => return Ok(delivered),
            Err(failure) => failure,
        };

        if failure.is_retryable() {
            return Err(DeliveryError::Failed {
                provider: primary.id,
                failure,
            });
        }

        let Some(fallback) = self.claim_fallback_provider(&primary.id, user_id).await else {
            return Err(DeliveryError::Failed {
                provider: primary.id,
                failure,
            });
        };

        internal!(
            level = WARN,
            provider = %primary.id,
            fallback = %fallback.id,
            error = %failure,
            "Permanent failure, failing over"
        );

        self.attempt(&fallback, payload).await.map_err(|fallback_failure| {
            internal!(
                level = WARN,
                provider = %fallback.id,
                error = %fallback_failure,
                "Fallback provider failed as well"
            );
            DeliveryError::Failed {
                provider: primary.id,
                failure,
            }
        })
    }
}
