//! Scripted providers and senders for driving the queue in tests
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use courier_common::{EmailPayload, ManualClock};
use courier_delivery::{DeliveryError, Delivered, MailSender};
use courier_provider::{
    EmailProvider, ProviderCore, ProviderLimits, ProviderStatistics, SendFailure, SendResult,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// What a mock provider does with its next message
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    Fail(SendFailure),
}

/// Provider that plays back a script, then repeats a default outcome
#[derive(Debug)]
pub struct MockProvider {
    core: ProviderCore,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    verify: Mutex<Result<(), SendFailure>>,
    calls: AtomicUsize,
    /// Suspend once inside the transport, like a real network call
    yields: bool,
}

impl MockProvider {
    pub fn new(id: &str, fallback: Outcome) -> Self {
        Self {
            core: ProviderCore::new(id, format!("Mock {id}"), ProviderLimits::default()),
            script: Mutex::new(VecDeque::new()),
            fallback,
            verify: Mutex::new(Ok(())),
            calls: AtomicUsize::new(0),
            yields: false,
        }
    }

    pub fn succeeding(id: &str) -> Arc<Self> {
        Arc::new(Self::new(id, Outcome::Succeed))
    }

    /// Succeeds, but only after giving other tasks a chance to run
    pub fn yielding(id: &str) -> Arc<Self> {
        let mut provider = Self::new(id, Outcome::Succeed);
        provider.yields = true;
        Arc::new(provider)
    }

    pub fn failing(id: &str, failure: SendFailure) -> Arc<Self> {
        Arc::new(Self::new(id, Outcome::Fail(failure)))
    }

    pub fn scripted(id: &str, script: Vec<Outcome>, fallback: Outcome) -> Arc<Self> {
        let provider = Self::new(id, fallback);
        *provider.script.lock() = script.into();
        Arc::new(provider)
    }

    pub fn with_limits(id: &str, limits: ProviderLimits) -> Arc<Self> {
        let mut provider = Self::new(id, Outcome::Succeed);
        provider.core = ProviderCore::new(id, format!("Mock {id}"), limits);
        Arc::new(provider)
    }

    pub fn set_verify(&self, result: Result<(), SendFailure>) {
        *self.verify.lock() = result;
    }

    /// Messages that reached the transport
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    async fn send(&self, message: &EmailPayload) -> SendResult {
        self.core
            .send(message, || async {
                if self.yields {
                    tokio::task::yield_now().await;
                }

                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                let outcome = self
                    .script
                    .lock()
                    .pop_front()
                    .unwrap_or_else(|| self.fallback.clone());

                match outcome {
                    Outcome::Succeed => Ok(Some(format!("{}-{call}", self.core.id()))),
                    Outcome::Fail(failure) => Err(failure),
                }
            })
            .await
    }

    async fn verify(&self) -> Result<(), SendFailure> {
        self.verify.lock().clone()
    }

    fn limits(&self) -> ProviderLimits {
        self.core.limits().clone()
    }

    fn statistics(&self) -> ProviderStatistics {
        self.core.statistics()
    }
}

/// Sender whose sends wait until the test releases them
#[derive(Debug)]
pub struct GatedSender {
    gate: Semaphore,
    started: AtomicUsize,
}

impl GatedSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
        })
    }

    /// Let `n` waiting sends complete
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailSender for GatedSender {
    async fn send(
        &self,
        _payload: &EmailPayload,
        _provider_id: &str,
        _user_id: &str,
    ) -> Result<Delivered, DeliveryError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| DeliveryError::NoProvider)?;
        permit.forget();

        Ok(Delivered {
            provider_id: "gated".to_string(),
            message_id: None,
        })
    }
}

/// Sender that records the subjects it was asked to send, in call order
#[derive(Debug, Default)]
pub struct RecordingSender {
    pub subjects: Mutex<Vec<String>>,
}

#[async_trait]
impl MailSender for RecordingSender {
    async fn send(
        &self,
        payload: &EmailPayload,
        _provider_id: &str,
        _user_id: &str,
    ) -> Result<Delivered, DeliveryError> {
        self.subjects.lock().push(payload.subject.clone());
        Ok(Delivered {
            provider_id: "recording".to_string(),
            message_id: None,
        })
    }
}

pub fn clock() -> ManualClock {
    ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
    )
}

pub fn payload(subject: &str) -> EmailPayload {
    EmailPayload::new()
        .from("noreply@example.com")
        .to("user@example.com")
        .subject(subject)
        .text("Hello")
}

pub fn retryable() -> SendFailure {
    SendFailure::from_status(503, "Service unavailable")
}

pub fn permanent() -> SendFailure {
    SendFailure::from_status(400, "Rejected")
}
