//! Provider upkeep on timers: periodic health checks and the daily counter
//! reset at UTC midnight.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use courier_common::{Clock, Signal, internal};
use courier_delivery::ProviderRegistry;
use tokio::sync::broadcast;

#[tracing::instrument(level = "trace", skip_all)]
pub async fn serve(
    registry: Arc<ProviderRegistry>,
    clock: Arc<dyn Clock>,
    health_check_interval: Duration,
    mut shutdown: broadcast::Receiver<Signal>,
) {
    internal!(
        level = INFO,
        interval_secs = health_check_interval.as_secs(),
        "Provider maintenance starting"
    );

    let mut health = tokio::time::interval(health_check_interval);
    health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let reset_in = until_next_day(clock.now());

        tokio::select! {
            _ = health.tick() => registry.perform_health_checks().await,
            () = tokio::time::sleep(reset_in) => registry.reset_daily_counters(),
            sig = shutdown.recv() => {
                if let Err(e) = sig {
                    tracing::error!("Maintenance shutdown channel error: {e}");
                }
                break;
            }
        }
    }

    internal!(level = INFO, "Provider maintenance stopped");
}

/// Time left until the next UTC midnight
fn until_next_day(now: DateTime<Utc>) -> Duration {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| (midnight.and_utc() - now).to_std().ok())
        .unwrap_or(Duration::from_secs(24 * 60 * 60))
}
