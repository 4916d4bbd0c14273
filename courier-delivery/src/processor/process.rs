//! One pass over the queue

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use ahash::AHashMap;
use courier_common::internal;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

use super::QueueProcessor;
use crate::{
    policy::RetryPolicy,
    queue::SendQueue,
    sender::MailSender,
    types::{JobStatus, SendJob},
};

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: usize,
    pub sent: usize,
    /// Failed attempts put back for a later tick
    pub retried: usize,
    /// Jobs that used their last attempt
    pub failed: usize,
    /// Finished jobs removed by the retention sweep
    pub cleaned: usize,
}

impl TickReport {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.dispatched == 0 && self.cleaned == 0
    }
}

/// Holds the processing flag for the lifetime of a tick
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl QueueProcessor {
    /// Dispatch due jobs and sweep finished ones.
    ///
    /// Returns `None` without doing anything if another tick is still running
    /// or the processor has been shut down.
    pub async fn tick(&self) -> Option<TickReport> {
        if self.stopped.load(Ordering::Acquire) {
            return None;
        }

        let Some(_guard) = TickGuard::acquire(&self.processing) else {
            debug!("Previous tick still in progress, skipping");
            return None;
        };

        let now = self.clock.now();
        let mut report = TickReport::default();
        let mut join_set = JoinSet::new();
        let mut in_flight: AHashMap<task::Id, String> = AHashMap::new();

        for due in self.queue.due_jobs(now).into_iter().take(self.config.max_concurrent) {
            let Some(job) = self.queue.begin(&due.id) else {
                continue;
            };

            report.dispatched += 1;
            let id = job.id.clone();
            let handle = join_set.spawn(dispatch(
                self.queue.clone(),
                Arc::clone(&self.sender),
                self.config.retry.clone(),
                job,
            ));
            in_flight.insert(handle.id(), id);
        }

        while let Some(result) = join_set.join_next_with_id().await {
            match result {
                Ok((_, Some(JobStatus::Sent))) => report.sent += 1,
                Ok((_, Some(JobStatus::Pending))) => report.retried += 1,
                Ok((_, Some(JobStatus::Failed))) => report.failed += 1,
                Ok(_) => {}
                Err(err) => {
                    let job_id = in_flight.get(&err.id()).cloned().unwrap_or_default();
                    error!(job_id = %job_id, error = %err, "Dispatch task aborted");

                    let status = self.queue.record_failure(
                        &job_id,
                        format!("Dispatch aborted: {err}"),
                        |retry_count| self.config.retry.next_attempt(self.clock.now(), retry_count),
                    );
                    match status {
                        Some(JobStatus::Pending) => report.retried += 1,
                        Some(JobStatus::Failed) => report.failed += 1,
                        _ => {}
                    }
                }
            }
        }

        report.cleaned = self.queue.cleanup_old_items();
        Some(report)
    }
}

/// Send one job and record the outcome. Returns the job's new status.
async fn dispatch(
    queue: SendQueue,
    sender: Arc<dyn MailSender>,
    retry: RetryPolicy,
    job: SendJob,
) -> Option<JobStatus> {
    internal!(
        level = DEBUG,
        job_id = %job.id,
        priority = ?job.priority,
        attempt = job.retry_count + 1,
        "Dispatching email"
    );

    match sender
        .send(&job.payload, &job.provider_id, &job.user_id)
        .await
    {
        Ok(delivered) => {
            info!(
                job_id = %job.id,
                provider = %delivered.provider_id,
                message_id = delivered.message_id.as_deref().unwrap_or_default(),
                "Email sent"
            );
            queue.mark_sent(&job.id, delivered.provider_id, delivered.message_id);
            Some(JobStatus::Sent)
        }
        Err(err) => {
            let status = queue.record_failure(&job.id, err.to_string(), |retry_count| {
                retry.next_attempt(queue.now(), retry_count)
            });

            match status {
                Some(JobStatus::Pending) => warn!(
                    job_id = %job.id,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Send failed, will retry"
                ),
                Some(JobStatus::Failed) => error!(
                    job_id = %job.id,
                    error = %err,
                    "Send failed, no attempts left"
                ),
                _ => {}
            }

            status
        }
    }
}
