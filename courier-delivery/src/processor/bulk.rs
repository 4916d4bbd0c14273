//! Paced submission of many jobs at once

use std::time::Duration;

use ahash::AHashSet;
use courier_common::{EmailPayload, internal};

use super::QueueProcessor;
use crate::{error::QueueError, types::EnqueueOptions};

/// One message of a bulk submission
#[derive(Debug, Clone)]
pub struct BulkItem {
    pub payload: EmailPayload,
    pub user_id: String,
    pub options: EnqueueOptions,
}

impl BulkItem {
    #[must_use]
    pub fn new(payload: EmailPayload, user_id: impl Into<String>) -> Self {
        Self {
            payload,
            user_id: user_id.into(),
            options: EnqueueOptions::default(),
        }
    }

    /// Items with equal keys are duplicates of each other
    fn dedup_key(&self) -> (String, Vec<String>, String) {
        (
            self.user_id.clone(),
            self.payload.sorted_recipients(),
            self.payload.subject.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BulkOptions {
    /// Drop repeats of (user, recipients, subject) within the submission
    pub deduplicate: bool,
    /// Overrides the processor's batch size
    pub batch_size: Option<usize>,
    /// Overrides the processor's pause between batches
    pub batch_delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct BulkReport {
    /// Ids of the created jobs, in submission order
    pub queued: Vec<String>,
    /// Items dropped as duplicates
    pub duplicates: usize,
    /// Items the queue refused, by their index in the submission
    pub rejected: Vec<(usize, QueueError)>,
    pub batches: usize,
}

impl QueueProcessor {
    /// Enqueue `items` in batches, pausing between batches.
    pub async fn submit_bulk(&self, items: Vec<BulkItem>, options: BulkOptions) -> BulkReport {
        let batch_size = options
            .batch_size
            .unwrap_or(self.config.bulk_batch_size)
            .max(1);
        let delay = options
            .batch_delay
            .unwrap_or_else(|| self.config.bulk_batch_delay());

        let mut report = BulkReport::default();
        let mut seen = AHashSet::new();
        let mut items = items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| {
                let unique = !options.deduplicate || seen.insert(item.dedup_key());
                if !unique {
                    report.duplicates += 1;
                }
                unique
            })
            .collect::<Vec<_>>()
            .into_iter()
            .peekable();

        while items.peek().is_some() {
            if report.batches > 0 {
                tokio::time::sleep(delay).await;
            }

            for (index, item) in items.by_ref().take(batch_size) {
                match self
                    .queue
                    .add_to_queue(item.payload, &item.user_id, item.options)
                {
                    Ok(id) => report.queued.push(id),
                    Err(err) => report.rejected.push((index, err)),
                }
            }

            report.batches += 1;
            internal!(
                level = DEBUG,
                batch = report.batches,
                queued = report.queued.len(),
                "Enqueued bulk batch"
            );
        }

        internal!(
            level = INFO,
            queued = report.queued.len(),
            duplicates = report.duplicates,
            rejected = report.rejected.len(),
            batches = report.batches,
            "Bulk submission complete"
        );

        report
    }
}
