//! The recurring tick that drains the send queue

mod bulk;
mod process;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use courier_common::{Clock, Signal, internal};
use serde::Deserialize;
use tokio::sync::{Notify, broadcast};

pub use bulk::{BulkItem, BulkOptions, BulkReport};
pub use process::TickReport;

use crate::{policy::RetryPolicy, queue::SendQueue, sender::MailSender};

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// How often the queue is processed (in milliseconds)
    ///
    /// Default: 5000 milliseconds
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Jobs dispatched concurrently in one tick
    ///
    /// Default: 10
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Jobs enqueued per bulk batch
    ///
    /// Default: 50
    #[serde(default = "defaults::bulk_batch_size")]
    pub bulk_batch_size: usize,

    /// Pause between bulk batches (in milliseconds)
    ///
    /// Default: 1000 milliseconds
    #[serde(default = "defaults::bulk_batch_delay_ms")]
    pub bulk_batch_delay_ms: u64,

    /// How long sent, failed and cancelled jobs are kept (in hours)
    ///
    /// Default: 24 hours
    #[serde(default = "defaults::retention_hours")]
    pub retention_hours: u64,

    /// Longest wait for an in-flight tick during shutdown (in seconds)
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: defaults::tick_interval_ms(),
            max_concurrent: defaults::max_concurrent(),
            bulk_batch_size: defaults::bulk_batch_size(),
            bulk_batch_delay_ms: defaults::bulk_batch_delay_ms(),
            retention_hours: defaults::retention_hours(),
            shutdown_timeout_secs: defaults::shutdown_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ProcessorConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        // A zero period would make the interval timer panic
        Duration::from_millis(if self.tick_interval_ms == 0 {
            1
        } else {
            self.tick_interval_ms
        })
    }

    #[must_use]
    pub const fn bulk_batch_delay(&self) -> Duration {
        Duration::from_millis(self.bulk_batch_delay_ms)
    }

    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        i64::try_from(self.retention_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }
}

mod defaults {
    pub const fn tick_interval_ms() -> u64 {
        5000
    }

    pub const fn max_concurrent() -> usize {
        10
    }

    pub const fn bulk_batch_size() -> usize {
        50
    }

    pub const fn bulk_batch_delay_ms() -> u64 {
        1000
    }

    pub const fn retention_hours() -> u64 {
        24
    }

    pub const fn shutdown_timeout_secs() -> u64 {
        30
    }
}

/// Owns the send queue and dispatches due jobs through a [`MailSender`].
///
/// Constructed once and shared by whatever accepts submissions; [`run`](Self::run)
/// drives the ticks until shutdown.
#[derive(Debug)]
pub struct QueueProcessor {
    queue: SendQueue,
    sender: Arc<dyn MailSender>,
    clock: Arc<dyn Clock>,
    config: ProcessorConfig,
    processing: AtomicBool,
    stopped: AtomicBool,
    stop: Notify,
}

impl QueueProcessor {
    #[must_use]
    pub fn new(config: ProcessorConfig, sender: Arc<dyn MailSender>, clock: Arc<dyn Clock>) -> Self {
        let queue = SendQueue::new(Arc::clone(&clock)).with_retention(config.retention());

        Self {
            queue,
            sender,
            clock,
            config,
            processing: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop: Notify::new(),
        }
    }

    pub const fn queue(&self) -> &SendQueue {
        &self.queue
    }

    pub const fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// `true` while a tick is dispatching
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Tick on the configured interval until told to stop, either through
    /// `shutdown` or [`shutdown`](Self::shutdown).
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn run(&self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!(
            level = INFO,
            interval_ms = self.config.tick_interval_ms,
            max_concurrent = self.config.max_concurrent,
            "Queue processor starting"
        );

        let mut timer = tokio::time::interval(self.config.tick_interval());
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // The first tick completes immediately
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Some(report) = self.tick().await
                        && !report.is_idle()
                    {
                        tracing::info!(
                            dispatched = report.dispatched,
                            sent = report.sent,
                            retried = report.retried,
                            failed = report.failed,
                            cleaned = report.cleaned,
                            "Processed send queue"
                        );
                    }
                }
                () = self.stop.notified() => break,
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!(level = INFO, "Queue processor received shutdown signal");
                        }
                        Err(e) => {
                            tracing::error!("Queue processor shutdown channel error: {e}");
                        }
                    }
                    self.shutdown().await;
                    break;
                }
            }
        }

        internal!(level = INFO, "Queue processor shutdown complete");
    }

    /// Stop ticking and wait for an in-flight tick to settle.
    ///
    /// Sends already handed to a provider run to completion.
    pub async fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
        self.stop.notify_one();

        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        let start = tokio::time::Instant::now();

        while self.is_processing() {
            if start.elapsed() >= timeout {
                tracing::warn!(
                    "Shutdown timeout exceeded, in-flight sends keep their processing status"
                );
                return;
            }

            tracing::debug!(
                "Waiting for in-flight tick to complete ({:.1}s elapsed)...",
                start.elapsed().as_secs_f64()
            );
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        internal!(level = INFO, "Queue processor drained");
    }
}
