use chrono::{DateTime, NaiveDate, Utc};
use courier_provider::{HealthStatus, ProviderSettings};
use serde::Deserialize;

/// One configured outbound transport and its runtime bookkeeping.
///
/// The first group of fields comes from configuration. The rest is owned by
/// the registry and starts fresh on every run.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: String,

    pub name: String,

    /// Inactive providers are kept but never selected
    ///
    /// Default: `true`
    #[serde(default = "defaults::active")]
    pub active: bool,

    /// Lower is preferred. Ties keep configuration order.
    ///
    /// Default: 100
    #[serde(default = "defaults::priority")]
    pub priority: u32,

    /// Adapter settings used to build the transport
    pub settings: ProviderSettings,

    /// Sends allowed per day. Falls back to the adapter's own daily limit.
    #[serde(default)]
    pub daily_limit: Option<u64>,

    #[serde(skip)]
    pub daily_sent: u64,

    #[serde(skip)]
    pub last_reset_date: Option<NaiveDate>,

    #[serde(skip)]
    pub health: HealthStatus,

    #[serde(skip)]
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, settings: ProviderSettings) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: defaults::active(),
            priority: defaults::priority(),
            settings,
            daily_limit: None,
            daily_sent: 0,
            last_reset_date: None,
            health: HealthStatus::default(),
            last_health_check: None,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_daily_limit(mut self, limit: u64) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Under the daily limit and not down
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.daily_limit.is_none_or(|limit| self.daily_sent < limit)
            && self.health != HealthStatus::Down
    }

    /// Zero the daily counter and stamp `today`
    pub fn reset_daily(&mut self, today: NaiveDate) {
        self.daily_sent = 0;
        self.last_reset_date = Some(today);
    }

    /// Reset the daily counter if it was last reset before `today`
    pub(crate) fn refresh(&mut self, today: NaiveDate) {
        if self.last_reset_date.is_none_or(|last| last < today) {
            self.reset_daily(today);
        }
    }
}

mod defaults {
    pub const fn active() -> bool {
        true
    }

    pub const fn priority() -> u32 {
        100
    }
}
