//! Error types for feedflow
//!
//! This module defines the error taxonomy shared by the controllers.
//! All error types use `thiserror` for ergonomic error handling.
//!
//! Three outcomes are kept apart on purpose:
//!
//! - [`OperationError`]: a caller-supplied async operation failed
//! - [`RetryError`]: the retry executor gave up, carrying the last failure
//! - [`GuardRejection`]: a trigger was skipped by a concurrency or gating guard;
//!   this is not a failure and never reaches the operation

use std::fmt::Display;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure surfaced by a controller after its operation settled
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperationError {
    /// The caller-supplied operation rejected
    #[error("Operation failed: {0}")]
    Failed(String),

    /// Every configured attempt failed
    #[error("All {attempts} attempts failed, last error: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Message of the final failure
        last_error: String,
    },
}

impl OperationError {
    /// Create an operation failure from any message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error returned by [`RetryExecutor`](crate::retry::RetryExecutor)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RetryError<E> {
    /// All attempts failed; carries the error from the final attempt
    #[error("All {attempts} attempts failed: {last_error}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last_error: E,
    },

    /// The operation failed with an error the retry predicate refused
    #[error("Non-retryable failure on attempt {attempt}: {error}")]
    Aborted {
        /// Attempt on which the operation failed
        attempt: u32,
        /// The refused error
        error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Aborted { attempt, .. } => *attempt,
        }
    }

    /// Borrow the error from the final attempt
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Aborted { error, .. } => error,
        }
    }

    /// Consume and return the error from the final attempt
    pub fn into_last_error(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Aborted { error, .. } => error,
        }
    }
}

impl<E: Display> From<RetryError<E>> for OperationError {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => OperationError::RetriesExhausted {
                attempts,
                last_error: last_error.to_string(),
            },
            RetryError::Aborted { error, .. } => OperationError::Failed(error.to_string()),
        }
    }
}

/// Reason a trigger was skipped without invoking the operation
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    /// A load is already outstanding (controller or caller reported)
    #[error("a load is already in progress")]
    AlreadyLoading,

    /// The data source reported no further pages
    #[error("no more pages to load")]
    NoMorePages,

    /// The controller is disabled
    #[error("controller is disabled")]
    Disabled,

    /// The sentinel is outside the proximity threshold
    #[error("sentinel is not within the threshold")]
    NotIntersecting,

    /// The previous load failed and waits for an explicit retry
    #[error("waiting for an explicit retry")]
    AwaitingRetry,

    /// Retry requested while no failure is pending
    #[error("nothing to retry")]
    NotInError,

    /// A refresh is already running
    #[error("a refresh is already in progress")]
    AlreadyRefreshing,

    /// The surface is scrolled away from the top
    #[error("surface is not scrolled to the top")]
    NotAtTop,

    /// Touch move/end without an active pull
    #[error("no pull gesture in progress")]
    NotPulling,

    /// Pull released before reaching the threshold
    #[error("pull released below the threshold")]
    BelowThreshold,

    /// The controller has been disposed
    #[error("controller has been disposed")]
    Disposed,
}

/// Result of dispatching one event into a state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was applied
    Accepted,
    /// The event was skipped by a guard
    Rejected(GuardRejection),
}

impl Outcome {
    /// Whether the event was applied
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    /// The guard that rejected the event, if any
    pub fn rejection(&self) -> Option<GuardRejection> {
        match self {
            Outcome::Accepted => None,
            Outcome::Rejected(reason) => Some(*reason),
        }
    }
}

/// Errors from controller handles
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// The controller task has stopped (disposed or dropped)
    #[error("Controller has been disposed")]
    Disposed,
}

/// Application-level error type
///
/// Aggregates the domain errors for the binary and the replay engine.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Operation error
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Controller error
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// Replay script error
    #[error("Replay error: {0}")]
    Replay(String),
}
