use serde::{Deserialize, Serialize};

/// Static sending ceilings of a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLimits {
    /// Messages per day
    #[serde(default)]
    pub daily: Option<u64>,

    /// Messages per hour
    #[serde(default)]
    pub hourly: Option<u64>,

    /// Messages per second
    #[serde(default)]
    pub per_second: Option<u32>,

    /// Recipients (to + cc + bcc) in a single message
    #[serde(default = "defaults::max_recipients")]
    pub max_recipients: usize,

    /// Size of a single attachment, in bytes
    #[serde(default = "defaults::max_attachment_size")]
    pub max_attachment_size: u64,

    /// Size of the whole message, in bytes
    #[serde(default = "defaults::max_email_size")]
    pub max_email_size: u64,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            daily: None,
            hourly: None,
            per_second: None,
            max_recipients: defaults::max_recipients(),
            max_attachment_size: defaults::max_attachment_size(),
            max_email_size: defaults::max_email_size(),
        }
    }
}

impl ProviderLimits {
    /// No ceilings at all
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            daily: None,
            hourly: None,
            per_second: None,
            max_recipients: usize::MAX,
            max_attachment_size: u64::MAX,
            max_email_size: u64::MAX,
        }
    }
}

mod defaults {
    pub const fn max_recipients() -> usize {
        50
    }

    pub const fn max_attachment_size() -> u64 {
        10 * 1024 * 1024 // 10 MiB
    }

    pub const fn max_email_size() -> u64 {
        25 * 1024 * 1024 // 25 MiB
    }
}
