//! In-memory table of send jobs

mod cleanup;
mod stats;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_common::{Clock, EmailPayload, internal};
use dashmap::DashMap;

use crate::{
    error::QueueError,
    types::{EnqueueOptions, JobStatus, SendJob},
};

/// Attempts allowed for every job before it is marked failed
pub const MAX_RETRIES: u32 = 3;

/// Owns every [`SendJob`]; handles are cheap to clone and share one table
#[derive(Debug, Clone)]
pub struct SendQueue {
    jobs: Arc<DashMap<String, SendJob>>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
}

impl SendQueue {
    /// An empty queue keeping terminal jobs for 24 hours
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            clock,
            retention: chrono::Duration::hours(24),
        }
    }

    /// How long a terminal job is kept after its last update
    #[must_use]
    pub const fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a pending job and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidPayload`] if the payload fails validation.
    pub fn add_to_queue(
        &self,
        payload: EmailPayload,
        user_id: &str,
        options: EnqueueOptions,
    ) -> Result<String, QueueError> {
        payload.validate()?;

        let job = SendJob::new(user_id, payload, options, MAX_RETRIES, self.now());
        let id = job.id.clone();

        internal!(
            level = DEBUG,
            job_id = %id,
            user_id,
            priority = ?job.priority,
            scheduled_at = %job.scheduled_at,
            "Queued email"
        );

        self.jobs.insert(id.clone(), job);
        Ok(id)
    }

    /// Snapshot of a job
    pub fn get_queue_item(&self, id: &str) -> Option<SendJob> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Every job owned by `user_id`, oldest first
    pub fn get_user_queue_items(&self, user_id: &str) -> Vec<SendJob> {
        let mut jobs: Vec<SendJob> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Cancel a pending job.
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or is not pending.
    pub fn cancel_email(&self, id: &str) -> Result<(), QueueError> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        let job = entry.value_mut();

        if job.status != JobStatus::Pending {
            return Err(QueueError::NotCancellable {
                id: id.to_string(),
                status: job.status,
            });
        }

        job.status = JobStatus::Cancelled;
        job.updated_at = self.now();
        internal!(level = DEBUG, job_id = %id, "Cancelled email");

        Ok(())
    }

    /// Pending jobs due at `now`, highest priority first, then by schedule
    pub(crate) fn due_jobs(&self, now: DateTime<Utc>) -> Vec<SendJob> {
        let mut due: Vec<SendJob> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().is_due(now))
            .map(|entry| entry.value().clone())
            .collect();

        due.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        due
    }

    /// Move a job from pending to processing.
    ///
    /// Returns `None` if the job is gone or no longer pending, e.g. cancelled
    /// after the tick picked it.
    pub(crate) fn begin(&self, id: &str) -> Option<SendJob> {
        let mut entry = self.jobs.get_mut(id)?;
        let job = entry.value_mut();
        if job.status != JobStatus::Pending {
            return None;
        }

        job.status = JobStatus::Processing;
        job.updated_at = self.now();
        Some(job.clone())
    }

    pub(crate) fn mark_sent(&self, id: &str, provider: String, message_id: Option<String>) {
        if let Some(mut entry) = self.jobs.get_mut(id)
            && entry.value().status == JobStatus::Processing
        {
            let now = self.now();
            let job = entry.value_mut();
            job.status = JobStatus::Sent;
            job.sent_at = Some(now);
            job.updated_at = now;
            job.sent_via = Some(provider);
            job.provider_message_id = message_id;
        }
    }

    /// Record a failed attempt and either requeue the job at `retry_at` or,
    /// once its retries are used up, fail it. Returns the resulting status.
    pub(crate) fn record_failure(
        &self,
        id: &str,
        error: String,
        retry_at: impl FnOnce(u32) -> DateTime<Utc>,
    ) -> Option<JobStatus> {
        let mut entry = self.jobs.get_mut(id)?;
        let job = entry.value_mut();
        if job.status != JobStatus::Processing {
            return Some(job.status);
        }

        job.retry_count = (job.retry_count + 1).min(job.max_retries);
        job.error = Some(error);
        job.updated_at = self.now();

        if job.retry_count >= job.max_retries {
            job.status = JobStatus::Failed;
        } else {
            job.status = JobStatus::Pending;
            job.scheduled_at = job.scheduled_at.max(retry_at(job.retry_count));
        }

        Some(job.status)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
