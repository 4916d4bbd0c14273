use std::{
    fmt::{self, Display},
    time::Duration,
};

use serde::{Deserialize, Serialize};

/// Health of a provider as seen by the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    /// Usable, but recently failing or slow
    Degraded,
    /// Not selected for sends until a health check succeeds
    Down,
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Down => "down",
        })
    }
}

/// Result of one [`health_check`](crate::EmailProvider::health_check)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub latency: Duration,
    pub error: Option<String>,
}
