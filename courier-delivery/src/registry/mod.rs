//! Configured providers and the rules for picking one.
//!
//! Selection for a send:
//! 1. an explicitly requested provider, if it is usable
//! 2. the user's override, if the resolver names a usable provider
//! 3. the usable provider with the lowest priority, configuration order
//!    breaking ties
//!
//! Usable means registered with an adapter, active, under its daily limit
//! and not down.

mod config;
mod failover;
mod resolver;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use courier_common::{Clock, internal};
use courier_provider::{EmailProvider, HealthStatus, ProviderStatistics, SendFailure};
use parking_lot::Mutex;
use serde::Serialize;

pub use config::ProviderConfig;
pub use resolver::{NoUserOverrides, StaticUserOverrides, UserTransportResolver};

use crate::{error::DeliveryError, types::AUTO_PROVIDER};

/// A provider chosen for one send attempt
#[derive(Debug, Clone)]
pub struct Selection {
    pub id: String,
    pub provider: Arc<dyn EmailProvider>,
}

/// Point-in-time view of one provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub priority: u32,
    pub daily_limit: Option<u64>,
    pub daily_sent: u64,
    pub health: HealthStatus,
    pub last_health_check: Option<DateTime<Utc>>,
    /// `None` when the adapter failed to build
    pub statistics: Option<ProviderStatistics>,
}

/// Turns a usable entry into a selection, optionally taking a daily send
type Claim = fn(&ProviderEntry, NaiveDate) -> Option<Selection>;

#[derive(Debug)]
struct ProviderEntry {
    id: String,
    config: Mutex<ProviderConfig>,
    adapter: Option<Arc<dyn EmailProvider>>,
}

/// Every configured provider, in configuration order
#[derive(Debug)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
    resolver: Arc<dyn UserTransportResolver>,
    clock: Arc<dyn Clock>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            resolver: Arc::new(NoUserOverrides),
            clock,
        }
    }

    /// Build adapters for every configuration, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if two configurations share an id.
    pub fn from_configs(
        configs: impl IntoIterator<Item = ProviderConfig>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DeliveryError> {
        let mut registry = Self::new(clock);
        for config in configs {
            registry.add(config)?;
        }
        Ok(registry)
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn UserTransportResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Build the adapter from `config.settings` and register it.
    ///
    /// A provider whose adapter cannot be built is kept, unregistered, so it
    /// shows up in statistics but is never selected.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already registered.
    pub fn add(&mut self, config: ProviderConfig) -> Result<(), DeliveryError> {
        match config.settings.build(&config.id, &config.name) {
            Ok(adapter) => self.register(config, adapter),
            Err(err) => {
                internal!(
                    level = ERROR,
                    provider = %config.id,
                    error = %err,
                    "Unable to initialise provider, it will not be used"
                );
                self.insert(config, None)
            }
        }
    }

    /// Register `adapter` under `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already registered.
    pub fn register(
        &mut self,
        config: ProviderConfig,
        adapter: Arc<dyn EmailProvider>,
    ) -> Result<(), DeliveryError> {
        self.insert(config, Some(adapter))
    }

    fn insert(
        &mut self,
        mut config: ProviderConfig,
        adapter: Option<Arc<dyn EmailProvider>>,
    ) -> Result<(), DeliveryError> {
        if self.entry(&config.id).is_some() {
            return Err(DeliveryError::DuplicateProvider(config.id));
        }

        if config.daily_limit.is_none() {
            config.daily_limit = adapter.as_ref().and_then(|adapter| adapter.limits().daily);
        }
        config.reset_daily(self.today());

        internal!(
            level = INFO,
            provider = %config.id,
            priority = config.priority,
            active = config.active,
            "Registered provider"
        );

        self.entries.push(ProviderEntry {
            id: config.id.clone(),
            config: Mutex::new(config),
            adapter,
        });
        Ok(())
    }

    fn entry(&self, id: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Priority of `entry`, if it can take a send right now
    fn usable(entry: &ProviderEntry, today: NaiveDate) -> Option<u32> {
        entry.adapter.as_ref()?;
        let mut config = entry.config.lock();
        config.refresh(today);

        (config.active && config.is_available()).then_some(config.priority)
    }

    /// `entry` as a selection if it is usable, without taking a daily send
    fn peek(entry: &ProviderEntry, today: NaiveDate) -> Option<Selection> {
        let adapter = entry.adapter.as_ref()?;
        Self::usable(entry, today)?;
        Some(Selection {
            id: entry.id.clone(),
            provider: Arc::clone(adapter),
        })
    }

    /// Take one of `entry`'s daily sends, if it is still usable.
    ///
    /// The check and the increment happen under one lock. A failed send
    /// hands the slot back through [`release`](Self::release).
    fn reserve(entry: &ProviderEntry, today: NaiveDate) -> Option<Selection> {
        let adapter = entry.adapter.as_ref()?;
        let mut config = entry.config.lock();
        config.refresh(today);

        if !(config.active && config.is_available()) {
            return None;
        }

        config.daily_sent += 1;
        Some(Selection {
            id: entry.id.clone(),
            provider: Arc::clone(adapter),
        })
    }

    /// Return a slot taken by [`reserve`](Self::reserve) for a send that
    /// did not go through
    fn release(&self, id: &str) {
        if let Some(entry) = self.entry(id) {
            let mut config = entry.config.lock();
            config.daily_sent = config.daily_sent.saturating_sub(1);
        }
    }

    async fn choose(&self, user_id: &str, exclude: Option<&str>, claim: Claim) -> Option<Selection> {
        let today = self.today();

        if let Some(id) = self.resolver.resolve(user_id).await
            && exclude != Some(id.as_str())
        {
            match self.entry(&id).and_then(|entry| claim(entry, today)) {
                Some(selection) => return Some(selection),
                None => internal!(
                    level = DEBUG,
                    user_id,
                    provider = %id,
                    "User override is not usable, falling back to priority order"
                ),
            }
        }

        let mut candidates: Vec<(u32, &ProviderEntry)> = self
            .entries
            .iter()
            .filter(|entry| exclude != Some(entry.id.as_str()))
            .filter_map(|entry| Self::usable(entry, today).map(|priority| (priority, entry)))
            .collect();
        candidates.sort_by_key(|(priority, _)| *priority);

        // Another send may take the last slot between the check and the claim
        candidates
            .into_iter()
            .find_map(|(_, entry)| claim(entry, today))
    }

    async fn pick(&self, requested: &str, user_id: &str, claim: Claim) -> Option<Selection> {
        if requested != AUTO_PROVIDER {
            if let Some(selection) = self
                .entry(requested)
                .and_then(|entry| claim(entry, self.today()))
            {
                return Some(selection);
            }

            internal!(
                level = DEBUG,
                provider = %requested,
                "Requested provider is not usable, choosing automatically"
            );
        }

        self.choose(user_id, None, claim).await
    }

    /// Pick the provider for a send. `requested` is a provider id or
    /// [`AUTO_PROVIDER`].
    ///
    /// Only looks; the daily counter is untouched.
    pub async fn select_provider(&self, requested: &str, user_id: &str) -> Option<Selection> {
        self.pick(requested, user_id, Self::peek).await
    }

    /// Pick a provider other than `failed` for the same send
    pub async fn select_fallback_provider(&self, failed: &str, user_id: &str) -> Option<Selection> {
        self.choose(user_id, Some(failed), Self::peek).await
    }

    /// Like [`select_provider`](Self::select_provider), but takes one of the
    /// chosen provider's daily sends
    pub(crate) async fn claim_provider(&self, requested: &str, user_id: &str) -> Option<Selection> {
        self.pick(requested, user_id, Self::reserve).await
    }

    pub(crate) async fn claim_fallback_provider(
        &self,
        failed: &str,
        user_id: &str,
    ) -> Option<Selection> {
        self.choose(user_id, Some(failed), Self::reserve).await
    }

    /// Run every adapter's health check and store the outcome
    pub async fn perform_health_checks(&self) {
        for entry in &self.entries {
            let Some(adapter) = &entry.adapter else {
                continue;
            };

            let check = adapter.health_check().await;
            let now = self.clock.now();

            let mut config = entry.config.lock();
            if config.health != check.status {
                internal!(
                    level = INFO,
                    provider = %entry.id,
                    from = %config.health,
                    to = %check.status,
                    latency_ms = check.latency.as_millis(),
                    error = check.error.as_deref().unwrap_or_default(),
                    "Provider health changed"
                );
            }
            config.health = check.status;
            config.last_health_check = Some(now);
        }
    }

    /// Zero every provider's daily counter
    pub fn reset_daily_counters(&self) {
        let today = self.today();
        for entry in &self.entries {
            entry.config.lock().reset_daily(today);
        }
        internal!(level = INFO, %today, "Reset daily provider counters");
    }

    /// Enable or disable a provider without removing it.
    ///
    /// # Errors
    ///
    /// Returns an error if no provider has this id.
    pub fn set_active(&self, id: &str, active: bool) -> Result<(), DeliveryError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| DeliveryError::UnknownProvider(id.to_string()))?;
        entry.config.lock().active = active;
        internal!(level = INFO, provider = %id, active, "Provider toggled");
        Ok(())
    }

    /// Configuration and runtime state of one provider
    pub fn provider_config(&self, id: &str) -> Option<ProviderConfig> {
        self.entry(id).map(|entry| entry.config.lock().clone())
    }

    pub fn provider_statistics(&self) -> Vec<ProviderSnapshot> {
        self.entries
            .iter()
            .map(|entry| {
                let statistics = entry.adapter.as_ref().map(|adapter| adapter.statistics());
                let config = entry.config.lock();
                ProviderSnapshot {
                    id: entry.id.clone(),
                    name: config.name.clone(),
                    active: config.active,
                    priority: config.priority,
                    daily_limit: config.daily_limit,
                    daily_sent: config.daily_sent,
                    health: config.health,
                    last_health_check: config.last_health_check,
                    statistics,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lift a degraded provider after a delivered message
    fn record_success(&self, id: &str) {
        let Some(entry) = self.entry(id) else {
            return;
        };

        let mut config = entry.config.lock();
        if config.health == HealthStatus::Degraded {
            config.health = HealthStatus::Healthy;
            internal!(level = INFO, provider = %id, "Provider recovered");
        }
    }

    /// A retryable failure marks a healthy provider degraded
    fn record_failure(&self, id: &str, failure: &SendFailure) {
        let Some(entry) = self.entry(id) else {
            return;
        };

        let mut config = entry.config.lock();
        if failure.is_retryable() && config.health == HealthStatus::Healthy {
            config.health = HealthStatus::Degraded;
            internal!(
                level = WARN,
                provider = %id,
                error = %failure,
                "Provider degraded"
            );
        }
    }
}
