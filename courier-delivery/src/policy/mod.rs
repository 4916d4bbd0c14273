//! Scheduling policies applied by the processor

pub mod retry;

pub use retry::RetryPolicy;
