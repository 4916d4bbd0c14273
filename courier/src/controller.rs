use std::{sync::Arc, time::Duration};

use courier_common::{Clock, Signal, SystemClock, internal, logging};
use courier_delivery::{
    ProcessorConfig, ProviderConfig, ProviderRegistry, QueueProcessor, StaticUserOverrides,
};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::maintenance;

const fn default_health_check_interval() -> u64 {
    300
}

/// Top-level configuration, read from `courier.config.ron`
#[derive(Debug, Deserialize)]
pub struct Courier {
    /// Outbound providers, in tie-break order
    #[serde(alias = "provider", default)]
    providers: Vec<ProviderConfig>,

    #[serde(alias = "processor", default)]
    queue: ProcessorConfig,

    /// How often every provider's health is checked (in seconds)
    ///
    /// Default: 300 seconds (5 minutes)
    #[serde(default = "default_health_check_interval")]
    health_check_interval_secs: u64,

    /// User id to provider id routes taking precedence over priority order
    #[serde(default)]
    user_overrides: StaticUserOverrides,
}

/// The running pieces built from a [`Courier`] configuration
#[derive(Debug, Clone)]
pub struct Services {
    pub registry: Arc<ProviderRegistry>,
    pub processor: Arc<QueueProcessor>,
    clock: Arc<dyn Clock>,
    health_check_interval: Duration,
}

async fn shutdown(sender: broadcast::Sender<Signal>) -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    sender
        .send(Signal::Shutdown)
        .map_err(|e| anyhow::anyhow!("Unable to broadcast shutdown: {e}"))?;

    Ok(())
}

impl Courier {
    /// Build the provider registry and queue processor.
    ///
    /// # Errors
    ///
    /// Returns an error if two providers share an id.
    pub fn build(self, clock: Arc<dyn Clock>) -> anyhow::Result<Services> {
        let registry = ProviderRegistry::from_configs(self.providers, Arc::clone(&clock))?;
        let registry = if self.user_overrides.is_empty() {
            registry
        } else {
            registry.with_resolver(Arc::new(self.user_overrides))
        };

        if registry.is_empty() {
            tracing::warn!("No providers configured, every send will be retried until it fails");
        }

        let registry = Arc::new(registry);
        let processor = Arc::new(QueueProcessor::new(
            self.queue,
            Arc::clone(&registry) as _,
            Arc::clone(&clock),
        ));

        Ok(Services {
            registry,
            processor,
            clock,
            health_check_interval: Duration::from_secs(self.health_check_interval_secs.max(1)),
        })
    }

    /// Run until SIGINT or SIGTERM, then drain the queue processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or signal handlers
    /// cannot be installed.
    #[tracing::instrument(level = "trace", skip_all, err)]
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let services = self.build(Arc::new(SystemClock))?;
        internal!(
            level = INFO,
            providers = services.registry.len(),
            "Controller running"
        );

        let (sender, _) = broadcast::channel(16);
        let serving = services.serve(&sender);
        tokio::pin!(serving);

        let ret = tokio::select! {
            () = &mut serving => Ok(()),
            r = shutdown(sender.clone()) => r,
        };

        if ret.is_ok() {
            serving.await;
        }

        internal!(level = INFO, "Shut down");
        ret
    }
}

impl Services {
    /// Run the queue processor and provider maintenance until `shutdown`
    /// broadcasts.
    pub async fn serve(&self, shutdown: &broadcast::Sender<Signal>) {
        let processor = Arc::clone(&self.processor);
        let maintenance = maintenance::serve(
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
            self.health_check_interval,
            shutdown.subscribe(),
        );

        tokio::join!(processor.run(shutdown.subscribe()), maintenance);
    }
}
