//! Send queue and provider selection for outbound email
//!
//! This crate provides functionality to:
//! - Hold send jobs in memory until they are due
//! - Choose a provider per send, failing over once on a permanent failure
//! - Retry failed sends with base-3 exponential backoff
//! - Track per-provider daily limits and health

mod error;
pub mod policy;
mod processor;
pub mod queue;
pub mod registry;
mod sender;
mod service;
mod types;

pub use error::{DeliveryError, QueueError};
pub use policy::RetryPolicy;
pub use processor::{BulkItem, BulkOptions, BulkReport, ProcessorConfig, QueueProcessor, TickReport};
pub use queue::{MAX_RETRIES, SendQueue};
pub use registry::{
    NoUserOverrides, ProviderConfig, ProviderRegistry, ProviderSnapshot, Selection,
    StaticUserOverrides, UserTransportResolver,
};
pub use sender::{Delivered, MailSender};
pub use service::QueueService;
pub use types::{AUTO_PROVIDER, EnqueueOptions, JobStatus, QueueStatistics, SendJob};
