use std::fmt;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use courier_common::{EmailPayload, Priority};
use serde::{Deserialize, Serialize};

/// Provider id that lets the registry choose
pub const AUTO_PROVIDER: &str = "auto";

/// Where a job is in its life
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// `Sent`, `Failed` and `Cancelled` never change again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// One requested email delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendJob {
    pub id: String,
    pub user_id: String,
    pub priority: Priority,
    /// Earliest time the job may be dispatched
    pub scheduled_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: JobStatus,
    pub payload: EmailPayload,
    /// Requested provider, or [`AUTO_PROVIDER`]
    pub provider_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Message of the most recent failed attempt
    pub error: Option<String>,
    /// Provider that accepted the message
    pub sent_via: Option<String>,
    pub provider_message_id: Option<String>,
}

impl SendJob {
    pub(crate) fn new(
        user_id: &str,
        mut payload: EmailPayload,
        options: EnqueueOptions,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        if let Some(track_opens) = options.track_opens {
            payload.track_opens = track_opens;
        }
        if let Some(track_clicks) = options.track_clicks {
            payload.track_clicks = track_clicks;
        }
        payload.tags.extend(options.tags);
        payload.metadata.extend(options.metadata);

        Self {
            id: ulid::Ulid::new().to_string(),
            user_id: user_id.to_string(),
            priority: options.priority.unwrap_or_default(),
            scheduled_at: options.scheduled_at.unwrap_or(now),
            retry_count: 0,
            max_retries,
            status: JobStatus::Pending,
            payload,
            provider_id: options
                .provider_id
                .unwrap_or_else(|| AUTO_PROVIDER.to_string()),
            created_at: now,
            updated_at: now,
            sent_at: None,
            error: None,
            sent_via: None,
            provider_message_id: None,
        }
    }

    /// Pending and scheduled at or before `now`
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now
    }
}

/// Per-job settings accepted alongside the payload on enqueue
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnqueueOptions {
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Defaults to now
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Overrides the payload's own flag when set
    #[serde(default)]
    pub track_opens: Option<bool>,
    #[serde(default)]
    pub track_clicks: Option<bool>,
    /// Appended to the payload's tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Merged into the payload's metadata, replacing equal keys
    #[serde(default)]
    pub metadata: AHashMap<String, String>,
    /// Defaults to [`AUTO_PROVIDER`]
    #[serde(default)]
    pub provider_id: Option<String>,
}

impl EnqueueOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub const fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    #[must_use]
    pub fn provider(mut self, id: impl Into<String>) -> Self {
        self.provider_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Aggregate view over every job in the queue
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStatistics {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub sent: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Jobs created since midnight UTC
    pub created_today: usize,
    /// Mean of `sent_at - created_at` over sent jobs
    pub average_delivery_time: Option<std::time::Duration>,
    /// `sent / total`, or 0 for an empty queue
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn payload() -> EmailPayload {
        EmailPayload::new()
            .from("noreply@example.com")
            .to("user@example.com")
            .subject("Hi")
            .text("Hello")
    }

    #[test]
    fn test_new_job_defaults() {
        let now = Utc::now();
        let job = SendJob::new("user-1", payload(), EnqueueOptions::default(), 3, now);

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, Priority::Normal);
        assert_eq!(job.scheduled_at, now);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.max_retries, 3);
        assert_eq!(job.provider_id, AUTO_PROVIDER);
        assert_eq!(job.id.len(), 26);
        assert!(job.is_due(now));
    }

    #[test]
    fn test_options_apply_to_payload() {
        let now = Utc::now();
        let later = now + Duration::hours(1);
        let mut options = EnqueueOptions::new()
            .priority(Priority::High)
            .scheduled_at(later)
            .provider("primary")
            .tag("welcome");
        options.track_opens = Some(true);
        options
            .metadata
            .insert("campaign".to_string(), "spring".to_string());

        let job = SendJob::new("user-1", payload(), options, 3, now);

        assert_eq!(job.priority, Priority::High);
        assert_eq!(job.provider_id, "primary");
        assert!(job.payload.track_opens);
        assert!(!job.payload.track_clicks);
        assert_eq!(job.payload.tags, vec!["welcome".to_string()]);
        assert_eq!(
            job.payload.metadata.get("campaign").map(String::as_str),
            Some("spring")
        );
        assert!(!job.is_due(now));
        assert!(job.is_due(later));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Sent.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert_eq!(JobStatus::Cancelled.to_string(), "cancelled");
    }
}
