//! Bounded retry with exponential backoff

pub mod executor;

pub use executor::{RetryExecutor, RetryState};

/// Retry policy: attempts, delays and jitter
pub type RetryPolicy = crate::config::RetryConfig;
