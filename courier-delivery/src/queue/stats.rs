use chrono::{DateTime, Utc};

use super::SendQueue;
use crate::types::{JobStatus, QueueStatistics};

impl SendQueue {
    /// Counts by status plus delivery timing over the whole table
    pub fn get_queue_statistics(&self) -> QueueStatistics {
        let midnight = start_of_day(self.now());
        let mut stats = QueueStatistics::default();
        let mut delivery_total = std::time::Duration::ZERO;

        for entry in self.jobs.iter() {
            let job = entry.value();
            stats.total += 1;

            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Sent => stats.sent += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }

            if job.created_at >= midnight {
                stats.created_today += 1;
            }

            if job.status == JobStatus::Sent
                && let Some(sent_at) = job.sent_at
            {
                delivery_total += (sent_at - job.created_at).to_std().unwrap_or_default();
            }
        }

        if stats.sent > 0 {
            let sent = u32::try_from(stats.sent).unwrap_or(u32::MAX);
            stats.average_delivery_time = Some(delivery_total / sent);
        }

        if stats.total > 0 {
            #[allow(clippy::cast_precision_loss)]
            let rate = stats.sent as f64 / stats.total as f64;
            stats.success_rate = rate;
        }

        stats
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}
