//! Deterministic debounce and throttle cores
//!
//! Neither type reads the clock or owns a timer. Callers pass `now` into
//! every operation and ask for [`Coalescer::deadline`] to learn when the
//! single pending emission becomes due. The async scheduler in
//! [`super::scheduler`] arms one sleep for that deadline.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::DebounceConfig;
use crate::timer::earliest;

/// Shared contract of the debounce and throttle cores
pub trait Coalescer<T> {
    /// Record an input; returns a value that must be emitted right away
    fn push(&mut self, value: T, now: Instant) -> Option<T>;

    /// When the pending emission becomes due
    fn deadline(&self) -> Option<Instant>;

    /// Emit the pending value if its deadline has passed
    fn poll_expired(&mut self, now: Instant) -> Option<T>;

    /// Emit the pending value immediately
    fn flush(&mut self, now: Instant) -> Option<T>;

    /// Drop the pending value; returns whether one was discarded
    fn cancel(&mut self) -> bool;

    /// Whether an emission is pending
    fn is_pending(&self) -> bool;
}

/// The one pending emission of a debouncer
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInvocation<T> {
    /// Value from the most recent input
    pub latest_value: T,
    /// Quiet-period deadline, re-armed by every input
    pub deadline: Instant,
    /// Deadline from `max_wait`, fixed by the first input of the burst
    pub max_deadline: Option<Instant>,
}

/// Trailing/leading-edge debouncer
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    max_wait: Option<Duration>,
    leading: bool,
    trailing: bool,
    pending: Option<PendingInvocation<T>>,
    last_fired_at: Option<Instant>,
}

impl<T> Debouncer<T> {
    /// Create a debouncer from configuration
    pub fn new(config: &DebounceConfig) -> Self {
        Self {
            delay: config.delay(),
            max_wait: config.max_wait(),
            leading: config.leading,
            trailing: config.trailing,
            pending: None,
            last_fired_at: None,
        }
    }

    /// Trailing-edge debouncer with the given delay
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            max_wait: None,
            leading: false,
            trailing: true,
            pending: None,
            last_fired_at: None,
        }
    }

    /// The pending emission, if any
    pub fn pending(&self) -> Option<&PendingInvocation<T>> {
        self.pending.as_ref()
    }

    /// When the last value was emitted
    pub fn last_fired_at(&self) -> Option<Instant> {
        self.last_fired_at
    }

    fn leading_edge_open(&self, now: Instant) -> bool {
        self.leading
            && self
                .last_fired_at
                .map_or(true, |at| now.saturating_duration_since(at) >= self.delay)
    }
}

impl<T> Coalescer<T> for Debouncer<T> {
    fn push(&mut self, value: T, now: Instant) -> Option<T> {
        if self.leading_edge_open(now) {
            self.pending = None;
            self.last_fired_at = Some(now);
            return Some(value);
        }

        let max_deadline = match &self.pending {
            Some(pending) => pending.max_deadline,
            None => self.max_wait.map(|wait| now + wait),
        };
        self.pending = Some(PendingInvocation {
            latest_value: value,
            deadline: now + self.delay,
            max_deadline,
        });
        None
    }

    fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .and_then(|p| earliest(Some(p.deadline), p.max_deadline))
    }

    fn poll_expired(&mut self, now: Instant) -> Option<T> {
        let due = self.deadline()?;
        if now < due {
            return None;
        }
        let pending = self.pending.take()?;
        if !self.trailing {
            return None;
        }
        self.last_fired_at = Some(now);
        Some(pending.latest_value)
    }

    fn flush(&mut self, now: Instant) -> Option<T> {
        let pending = self.pending.take()?;
        self.last_fired_at = Some(now);
        Some(pending.latest_value)
    }

    fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Throttle: bounded latency instead of waiting for quiet
///
/// Emits immediately when the last emission is at least `interval` old,
/// otherwise keeps the newest value and schedules it for the remaining wait.
#[derive(Debug, Clone)]
pub struct Throttler<T> {
    interval: Duration,
    pending: Option<(T, Instant)>,
    last_fired_at: Option<Instant>,
}

impl<T> Throttler<T> {
    /// Create a throttler emitting at most once per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            last_fired_at: None,
        }
    }

    /// When the last value was emitted
    pub fn last_fired_at(&self) -> Option<Instant> {
        self.last_fired_at
    }
}

impl<T> Coalescer<T> for Throttler<T> {
    fn push(&mut self, value: T, now: Instant) -> Option<T> {
        match self.last_fired_at {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.pending = Some((value, last + self.interval));
                None
            }
            _ => {
                self.pending = None;
                self.last_fired_at = Some(now);
                Some(value)
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    fn poll_expired(&mut self, now: Instant) -> Option<T> {
        match self.pending.take() {
            Some((value, at)) if now >= at => {
                self.last_fired_at = Some(now);
                Some(value)
            }
            other => {
                self.pending = other;
                None
            }
        }
    }

    fn flush(&mut self, now: Instant) -> Option<T> {
        let (value, _) = self.pending.take()?;
        self.last_fired_at = Some(now);
        Some(value)
    }

    fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
