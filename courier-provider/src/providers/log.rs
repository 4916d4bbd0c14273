use async_trait::async_trait;
use courier_common::{EmailPayload, internal};
use ulid::Ulid;

use crate::{
    base::ProviderCore, error::SendFailure, limits::ProviderLimits, provider::EmailProvider,
    provider::SendResult, stats::ProviderStatistics,
};

/// Logs each message at `INFO` and reports it delivered
#[derive(Debug)]
pub struct LogProvider {
    core: ProviderCore,
}

impl LogProvider {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            core: ProviderCore::new(id, name, ProviderLimits::unlimited()),
        }
    }
}

#[async_trait]
impl EmailProvider for LogProvider {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    async fn send(&self, message: &EmailPayload) -> SendResult {
        self.core
            .send(message, || async {
                let id = Ulid::new().to_string();
                internal!(
                    level = INFO,
                    provider = %self.core.id(),
                    message_id = %id,
                    to = ?message.sorted_recipients(),
                    subject = %message.subject,
                    "Logged outbound message"
                );
                Ok(Some(id))
            })
            .await
    }

    async fn verify(&self) -> Result<(), SendFailure> {
        Ok(())
    }

    fn limits(&self) -> ProviderLimits {
        self.core.limits().clone()
    }

    fn statistics(&self) -> ProviderStatistics {
        self.core.statistics()
    }
}
