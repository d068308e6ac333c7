//! Retry executor with exponential backoff
//!
//! Runs a caller-supplied async operation up to `max_attempts` times,
//! sleeping `min(initial_delay * multiplier^(attempt-1), max_delay)` between
//! attempts, and publishes its progress through a watch channel.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::RetryError;

/// Observable progress of the current invocation series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// An attempt after the first is running
    pub is_retrying: bool,
    /// Current attempt, 0 when idle
    pub attempt: u32,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Attempts remain after the current one
    pub can_retry: bool,
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            is_retrying: false,
            attempt: 0,
            last_error: None,
            can_retry: true,
        }
    }
}

/// Bookkeeping for one `execute` call
#[derive(Debug)]
struct RetryAttempt {
    attempt: u32,
    max_attempts: u32,
    last_error: Option<String>,
    next_delay: Option<Duration>,
}

impl RetryAttempt {
    fn first(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts,
            last_error: None,
            next_delay: None,
        }
    }

    fn has_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }

    fn started(&self) -> RetryState {
        RetryState {
            is_retrying: self.attempt > 1,
            attempt: self.attempt,
            last_error: self.last_error.clone(),
            can_retry: self.has_remaining(),
        }
    }

    /// Move to the next attempt, returning the delay to wait first
    fn advance(&mut self) -> Option<Duration> {
        self.attempt += 1;
        self.next_delay.take()
    }
}

/// Executes async operations with bounded retry
///
/// One executor tracks one invocation series at a time; concurrent calls
/// share the published [`RetryState`].
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    state: watch::Sender<RetryState>,
}

impl RetryExecutor {
    /// Create an executor; `max_attempts` of 0 is treated as 1
    pub fn new(mut config: RetryConfig) -> Self {
        config.max_attempts = config.max_attempts.max(1);
        let (state, _) = watch::channel(RetryState::default());
        Self { config, state }
    }

    /// Create an executor with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Run `operation`, retrying every failure
    ///
    /// # Returns
    ///
    /// The first successful result, or [`RetryError::Exhausted`] carrying
    /// the error of the final attempt.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_if(operation, |_| true).await
    }

    /// Run `operation`, retrying only failures accepted by `is_retryable`
    ///
    /// A refused failure is returned at once as [`RetryError::Aborted`].
    pub async fn execute_if<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut current = RetryAttempt::first(self.config.max_attempts);

        loop {
            self.state.send_replace(current.started());
            debug!(
                attempt = current.attempt,
                max_attempts = current.max_attempts,
                "Running attempt"
            );

            match operation().await {
                Ok(result) => {
                    if current.attempt > 1 {
                        info!(attempt = current.attempt, "Retry succeeded");
                    }
                    self.state.send_replace(RetryState::default());
                    return Ok(result);
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(attempt = current.attempt, error = %message, "Attempt failed");
                    current.last_error = Some(message.clone());

                    if !is_retryable(&err) {
                        self.state.send_replace(RetryState {
                            is_retrying: false,
                            attempt: current.attempt,
                            last_error: Some(message),
                            can_retry: false,
                        });
                        return Err(RetryError::Aborted {
                            attempt: current.attempt,
                            error: err,
                        });
                    }

                    if !current.has_remaining() {
                        warn!(
                            attempts = current.attempt,
                            max_attempts = current.max_attempts,
                            "Max attempts exhausted"
                        );
                        self.state.send_replace(RetryState {
                            is_retrying: false,
                            attempt: current.attempt,
                            last_error: current.last_error.take(),
                            can_retry: false,
                        });
                        return Err(RetryError::Exhausted {
                            attempts: current.attempt,
                            last_error: err,
                        });
                    }

                    let backoff = self.calculate_backoff(current.attempt);
                    current.next_delay = Some(backoff);
                    debug!(
                        attempt = current.attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Waiting before next attempt"
                    );

                    // The upcoming attempt is published before the backoff
                    let delay = current.advance();
                    self.state.send_replace(current.started());
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Delay after the failure of `attempt` (1-based)
    ///
    /// `initial_delay * multiplier^(attempt-1)` capped at `max_delay`, scaled
    /// to 50-100% when jitter is enabled.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        let capped = base.min(self.config.max_delay_ms as f64);

        let delay = if self.config.jitter {
            let jitter = rand::thread_rng().gen_range(0.5..1.0);
            capped * jitter
        } else {
            capped
        };

        Duration::from_millis(delay.round() as u64)
    }

    /// Clear the observable state for a new, independent series
    pub fn reset(&self) {
        self.state.send_replace(RetryState::default());
    }

    pub fn state(&self) -> RetryState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<RetryState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
