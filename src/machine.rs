//! Transition record shared by the controller state machines
//!
//! Every `dispatch` returns a [`Transition`]: the immutable snapshot after
//! the event was applied, at most one effect the driver has to carry out,
//! and the guard that rejected the event if it was skipped.

use crate::error::{GuardRejection, Outcome};

/// Result of dispatching one event
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, X> {
    /// State after the event
    pub snapshot: S,
    /// Side effect requested from the driver
    pub effect: Option<X>,
    /// Guard that skipped the event
    pub rejected: Option<GuardRejection>,
}

impl<S, X> Transition<S, X> {
    pub(crate) fn accepted(snapshot: S, effect: Option<X>) -> Self {
        Self {
            snapshot,
            effect,
            rejected: None,
        }
    }

    pub(crate) fn rejected(snapshot: S, reason: GuardRejection) -> Self {
        Self {
            snapshot,
            effect: None,
            rejected: Some(reason),
        }
    }

    /// Whether the event was applied or skipped
    pub fn outcome(&self) -> Outcome {
        match self.rejected {
            Some(reason) => Outcome::Rejected(reason),
            None => Outcome::Accepted,
        }
    }
}
