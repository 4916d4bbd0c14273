//! Service trait for whatever accepts submissions from outside, such as an
//! HTTP layer, so it does not depend on [`QueueProcessor`] directly.

use courier_common::EmailPayload;

use crate::{
    QueueProcessor,
    error::QueueError,
    types::{EnqueueOptions, QueueStatistics, SendJob},
};

pub trait QueueService: Send + Sync {
    /// Queue a message and return the job id.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is invalid.
    fn enqueue(
        &self,
        payload: EmailPayload,
        user_id: &str,
        options: EnqueueOptions,
    ) -> Result<String, QueueError>;

    /// Cancel a pending job. Returns `false` if the job is missing or no
    /// longer pending.
    fn cancel(&self, id: &str) -> bool;

    /// Snapshot of a job
    fn status(&self, id: &str) -> Option<SendJob>;

    fn user_jobs(&self, user_id: &str) -> Vec<SendJob>;

    fn statistics(&self) -> QueueStatistics;

    fn queue_len(&self) -> usize;
}

impl QueueService for QueueProcessor {
    fn enqueue(
        &self,
        payload: EmailPayload,
        user_id: &str,
        options: EnqueueOptions,
    ) -> Result<String, QueueError> {
        self.queue().add_to_queue(payload, user_id, options)
    }

    fn cancel(&self, id: &str) -> bool {
        self.queue().cancel_email(id).is_ok()
    }

    fn status(&self, id: &str) -> Option<SendJob> {
        self.queue().get_queue_item(id)
    }

    fn user_jobs(&self, user_id: &str) -> Vec<SendJob> {
        self.queue().get_user_queue_items(user_id)
    }

    fn statistics(&self) -> QueueStatistics {
        self.queue().get_queue_statistics()
    }

    fn queue_len(&self) -> usize {
        self.queue().len()
    }
}
