#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::{sync::Arc, time::Duration};

use chrono::Duration as TimeDelta;
use courier_common::{Clock, ManualClock, Priority, Signal};
use courier_delivery::{
    EnqueueOptions, JobStatus, MailSender, ProcessorConfig, ProviderConfig, ProviderRegistry,
    QueueProcessor, QueueService, TickReport,
};
use courier_provider::ProviderSettings;
use pretty_assertions::assert_eq;
use support::{
    GatedSender, MockProvider, RecordingSender, clock, payload, permanent, retryable,
};

fn processor(sender: Arc<dyn MailSender>, clock: &ManualClock) -> QueueProcessor {
    QueueProcessor::new(ProcessorConfig::default(), sender, Arc::new(clock.clone()))
}

fn registry_with(
    clock: &ManualClock,
    providers: Vec<(u32, Arc<MockProvider>)>,
) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new(Arc::new(clock.clone()));
    for (priority, provider) in providers {
        let id = courier_provider::EmailProvider::id(provider.as_ref()).to_string();
        registry
            .register(
                ProviderConfig::new(id.clone(), id, ProviderSettings::Log).with_priority(priority),
                provider,
            )
            .unwrap();
    }
    Arc::new(registry)
}

#[tokio::test]
async fn test_high_priority_job_is_sent() {
    let clock = clock();
    let registry = registry_with(&clock, vec![(1, MockProvider::succeeding("primary"))]);
    let processor = processor(registry.clone(), &clock);

    let id = processor
        .enqueue(
            payload("Welcome"),
            "user-1",
            EnqueueOptions::new()
                .priority(Priority::High)
                .scheduled_at(clock.now()),
        )
        .unwrap();

    let report = processor.tick().await.expect("tick runs");
    assert_eq!(
        report,
        TickReport {
            dispatched: 1,
            sent: 1,
            ..TickReport::default()
        }
    );

    let job = processor.status(&id).unwrap();
    assert_eq!(job.status, JobStatus::Sent);
    assert_eq!(job.sent_at, Some(clock.now()));
    assert_eq!(job.sent_via.as_deref(), Some("primary"));
    assert_eq!(job.provider_message_id.as_deref(), Some("primary-1"));
    assert_eq!(registry.provider_config("primary").unwrap().daily_sent, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_daily_limit_holds_across_one_tick() {
    let clock = clock();
    let mut registry = ProviderRegistry::new(Arc::new(clock.clone()));
    registry
        .register(
            ProviderConfig::new("primary", "primary", ProviderSettings::Log).with_daily_limit(1),
            MockProvider::yielding("primary"),
        )
        .unwrap();
    let registry = Arc::new(registry);
    let processor = processor(registry.clone(), &clock);

    let ids: Vec<String> = (0..5)
        .map(|i| {
            processor
                .enqueue(payload(&format!("Message {i}")), "user-1", EnqueueOptions::new())
                .unwrap()
        })
        .collect();

    let report = processor.tick().await.expect("tick runs");
    assert_eq!(report.dispatched, 5);
    assert_eq!(report.sent, 1);
    assert_eq!(report.retried, 4);
    assert_eq!(registry.provider_config("primary").unwrap().daily_sent, 1);

    let waiting: Vec<_> = ids
        .iter()
        .map(|id| processor.status(id).unwrap())
        .filter(|job| job.status == JobStatus::Pending)
        .collect();
    assert_eq!(waiting.len(), 4);
    for job in waiting {
        assert_eq!(job.retry_count, 1);
        assert!(job.error.as_deref().unwrap().contains("NO_PROVIDER_AVAILABLE"));
        assert!(job.scheduled_at > clock.now());
    }
}

#[tokio::test]
async fn test_retryable_failures_exhaust_retries() {
    let clock = clock();
    let registry = registry_with(
        &clock,
        vec![(1, MockProvider::failing("primary", retryable()))],
    );
    let processor = processor(registry, &clock);

    let id = processor
        .enqueue(payload("Welcome"), "user-1", EnqueueOptions::default())
        .unwrap();

    for (attempt, backoff) in [(1, 3), (2, 9)] {
        let report = processor.tick().await.unwrap();
        assert_eq!(report.retried, 1);

        let job = processor.status(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, attempt);
        assert!(job.scheduled_at >= clock.now() + TimeDelta::minutes(backoff));
        assert!(job.error.as_deref().unwrap().contains("HTTP_503"));

        // Not due yet
        assert_eq!(processor.tick().await.unwrap().dispatched, 0);
        clock.advance(TimeDelta::minutes(backoff));
    }

    let report = processor.tick().await.unwrap();
    assert_eq!(report.failed, 1);

    let job = processor.status(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 3);
    assert_eq!(job.retry_count, job.max_retries);
    assert!(job.error.is_some());

    // Failed stays failed
    clock.advance(TimeDelta::hours(1));
    assert_eq!(processor.tick().await.unwrap().dispatched, 0);
    assert_eq!(processor.status(&id).unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn test_backoff_is_base_three() {
    let clock = clock();
    let registry = registry_with(
        &clock,
        vec![(1, MockProvider::failing("primary", retryable()))],
    );
    let config = ProcessorConfig {
        retry: courier_delivery::RetryPolicy::default(),
        ..ProcessorConfig::default()
    };
    let processor = QueueProcessor::new(config, registry, Arc::new(clock.clone()));

    let id = processor
        .enqueue(payload("Welcome"), "user-1", EnqueueOptions::default())
        .unwrap();

    processor.tick().await.unwrap();
    let first = processor.status(&id).unwrap().scheduled_at;
    assert_eq!(first, clock.now() + TimeDelta::minutes(3));

    clock.set(first);
    processor.tick().await.unwrap();
    let second = processor.status(&id).unwrap().scheduled_at;
    assert_eq!(second, first + TimeDelta::minutes(9));
}

#[tokio::test]
async fn test_no_provider_is_retried() {
    let clock = clock();
    let registry = Arc::new(ProviderRegistry::new(Arc::new(clock.clone())));
    let processor = processor(registry, &clock);

    let id = processor
        .enqueue(payload("Welcome"), "user-1", EnqueueOptions::default())
        .unwrap();
    processor.tick().await.unwrap();

    let job = processor.status(&id).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 1);
    assert!(job.error.unwrap().contains("NO_PROVIDER_AVAILABLE"));
}

#[tokio::test]
async fn test_failover_within_one_attempt() {
    let clock = clock();
    let primary = MockProvider::failing("p1", permanent());
    let backup = MockProvider::succeeding("p2");
    let registry = registry_with(&clock, vec![(1, primary.clone()), (2, backup.clone())]);
    let processor = processor(registry, &clock);

    let id = processor
        .enqueue(payload("Welcome"), "user-1", EnqueueOptions::default())
        .unwrap();
    let report = processor.tick().await.unwrap();

    assert_eq!(report.sent, 1);
    let job = processor.status(&id).unwrap();
    assert_eq!(job.status, JobStatus::Sent);
    assert_eq!(job.sent_via.as_deref(), Some("p2"));
    assert_eq!(job.retry_count, 0);
    assert_eq!(primary.calls(), 1);
    assert_eq!(backup.calls(), 1);
}

#[tokio::test]
async fn test_high_priority_dispatched_first() {
    let clock = clock();
    let sender = Arc::new(RecordingSender::default());
    let config = ProcessorConfig {
        max_concurrent: 2,
        ..ProcessorConfig::default()
    };
    let processor = QueueProcessor::new(config, sender.clone(), Arc::new(clock.clone()));

    let low = processor
        .enqueue(
            payload("low"),
            "user-1",
            EnqueueOptions::new().priority(Priority::Low),
        )
        .unwrap();
    let normal = processor
        .enqueue(payload("normal"), "user-1", EnqueueOptions::default())
        .unwrap();
    let high: Vec<String> = (0..2)
        .map(|n| {
            processor
                .enqueue(
                    payload(&format!("high-{n}")),
                    "user-1",
                    EnqueueOptions::new().priority(Priority::High),
                )
                .unwrap()
        })
        .collect();

    let report = processor.tick().await.unwrap();
    assert_eq!(report.dispatched, 2);

    for id in &high {
        assert_eq!(processor.status(id).unwrap().status, JobStatus::Sent);
    }
    assert_eq!(processor.status(&normal).unwrap().status, JobStatus::Pending);
    assert_eq!(processor.status(&low).unwrap().status, JobStatus::Pending);

    let mut subjects = sender.subjects.lock().clone();
    subjects.sort();
    assert_eq!(subjects, vec!["high-0".to_string(), "high-1".to_string()]);

    processor.tick().await.unwrap();
    assert_eq!(processor.status(&normal).unwrap().status, JobStatus::Sent);
    assert_eq!(processor.status(&low).unwrap().status, JobStatus::Sent);
}

#[tokio::test]
async fn test_scheduled_jobs_wait() {
    let clock = clock();
    let processor = processor(Arc::new(RecordingSender::default()), &clock);

    let id = processor
        .enqueue(
            payload("Later"),
            "user-1",
            EnqueueOptions::new().scheduled_at(clock.now() + TimeDelta::minutes(10)),
        )
        .unwrap();

    assert_eq!(processor.tick().await.unwrap().dispatched, 0);

    clock.advance(TimeDelta::minutes(10));
    assert_eq!(processor.tick().await.unwrap().sent, 1);
    assert_eq!(processor.status(&id).unwrap().status, JobStatus::Sent);
}

#[tokio::test]
async fn test_tick_cleans_up_old_jobs() {
    let clock = clock();
    let processor = processor(Arc::new(RecordingSender::default()), &clock);

    let old = processor
        .enqueue(payload("Old"), "user-1", EnqueueOptions::default())
        .unwrap();
    processor.tick().await.unwrap();

    clock.advance(TimeDelta::hours(24) - TimeDelta::minutes(1));
    let recent = processor
        .enqueue(payload("Recent"), "user-1", EnqueueOptions::default())
        .unwrap();
    assert!(processor.cancel(&recent));

    clock.advance(TimeDelta::minutes(2));
    let report = processor.tick().await.unwrap();

    assert_eq!(report.cleaned, 1);
    assert!(processor.status(&old).is_none());
    assert_eq!(processor.status(&recent).unwrap().status, JobStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_tick_is_skipped() {
    let clock = clock();
    let sender = GatedSender::new();
    let processor = Arc::new(processor(sender.clone(), &clock));

    let id = processor
        .enqueue(payload("Held"), "user-1", EnqueueOptions::default())
        .unwrap();

    let running = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.tick().await }
    });

    while sender.started() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(processor.is_processing());
    assert!(processor.tick().await.is_none());

    // A job being sent cannot be cancelled
    assert!(!processor.cancel(&id));
    assert_eq!(processor.status(&id).unwrap().status, JobStatus::Processing);

    sender.release(1);
    let report = running.await.unwrap().expect("first tick ran");
    assert_eq!(report.sent, 1);
    assert!(!processor.is_processing());
    assert_eq!(processor.status(&id).unwrap().status, JobStatus::Sent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_waits_for_in_flight_tick() {
    let clock = clock();
    let sender = GatedSender::new();
    let processor = Arc::new(processor(sender.clone(), &clock));

    let id = processor
        .enqueue(payload("Held"), "user-1", EnqueueOptions::default())
        .unwrap();

    let running = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.tick().await }
    });

    while sender.started() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let shutdown = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.shutdown().await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());

    sender.release(1);
    shutdown.await.unwrap();
    assert!(!processor.is_processing());
    assert_eq!(processor.status(&id).unwrap().status, JobStatus::Sent);
    running.await.unwrap();

    // No more ticks once shut down
    processor
        .enqueue(payload("After"), "user-1", EnqueueOptions::default())
        .unwrap();
    assert!(processor.tick().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_run_ticks_until_shutdown_signal() {
    let clock = clock();
    let processor = Arc::new(processor(Arc::new(RecordingSender::default()), &clock));
    let (tx, rx) = tokio::sync::broadcast::channel(1);

    let id = processor
        .enqueue(payload("Welcome"), "user-1", EnqueueOptions::default())
        .unwrap();

    let handle = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.run(rx).await }
    });

    tokio::time::sleep(Duration::from_millis(5100)).await;
    assert_eq!(processor.status(&id).unwrap().status, JobStatus::Sent);

    tx.send(Signal::Shutdown).unwrap();
    handle.await.unwrap();
    assert!(processor.tick().await.is_none());
}

#[tokio::test]
async fn test_queue_service() {
    let clock = clock();
    let processor = processor(Arc::new(RecordingSender::default()), &clock);
    let service: &dyn QueueService = &processor;

    let first = service
        .enqueue(payload("One"), "user-1", EnqueueOptions::default())
        .unwrap();
    let second = service
        .enqueue(payload("Two"), "user-1", EnqueueOptions::default())
        .unwrap();
    service
        .enqueue(payload("Three"), "user-2", EnqueueOptions::default())
        .unwrap();

    assert!(service.enqueue(payload(""), "user-1", EnqueueOptions::default()).is_err());
    assert_eq!(service.queue_len(), 3);
    assert_eq!(service.user_jobs("user-1").len(), 2);

    assert!(service.cancel(&second));
    assert!(!service.cancel(&second));
    assert!(!service.cancel("missing"));

    processor.tick().await.unwrap();
    assert_eq!(service.status(&first).unwrap().status, JobStatus::Sent);

    let stats = service.statistics();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.created_today, 3);
    assert_eq!(stats.average_delivery_time, Some(Duration::ZERO));
}
