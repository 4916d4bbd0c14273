//! Per-user transport overrides consulted before the priority order

use std::fmt::Debug;

use ahash::AHashMap;
use async_trait::async_trait;
use serde::Deserialize;

/// Maps a user to the provider their mail should go through, if any
#[async_trait]
pub trait UserTransportResolver: Debug + Send + Sync {
    async fn resolve(&self, user_id: &str) -> Option<String>;
}

/// Never overrides
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUserOverrides;

#[async_trait]
impl UserTransportResolver for NoUserOverrides {
    async fn resolve(&self, _user_id: &str) -> Option<String> {
        None
    }
}

/// Fixed user id to provider id table, usually read from configuration
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(transparent)]
pub struct StaticUserOverrides {
    routes: AHashMap<String, String>,
}

impl StaticUserOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, user_id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        self.routes.insert(user_id.into(), provider_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[async_trait]
impl UserTransportResolver for StaticUserOverrides {
    async fn resolve(&self, user_id: &str) -> Option<String> {
        self.routes.get(user_id).cloned()
    }
}
