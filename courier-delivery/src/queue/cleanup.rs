//! Retention sweep for finished jobs

use courier_common::internal;

use super::SendQueue;

impl SendQueue {
    /// Remove terminal jobs whose last update is older than the retention
    /// window. Returns the number removed.
    pub fn cleanup_old_items(&self) -> usize {
        let cutoff = self.now() - self.retention;
        let before = self.jobs.len();

        self.jobs
            .retain(|_, job| !(job.status.is_terminal() && job.updated_at < cutoff));

        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            internal!(level = DEBUG, removed, "Removed finished jobs past retention");
        }
        removed
    }
}
