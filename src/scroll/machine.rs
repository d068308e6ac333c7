//! Infinite-scroll state machine
//!
//! Pure transition logic: no timers, no tasks. The caller supplies `now`
//! with every event and reads the armed debounce deadline back from
//! [`InfiniteScroll::debounce_deadline`].

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::InfiniteScrollConfig;
use crate::error::{GuardRejection, OperationError};
use crate::machine::Transition;

/// Lifecycle of an infinite-scroll controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollPhase {
    /// Disabled
    Idle,
    /// Waiting for the sentinel to come near the viewport
    Observing,
    /// A page load is outstanding
    Loading,
    /// The last load failed; waiting for an explicit retry
    Error,
    /// The source reported no further pages
    Exhausted,
}

/// Viewport signal about the sentinel element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Result of a native intersection observer that already applied the
    /// root margin
    Intersecting(bool),
    /// Raw geometry; the sentinel counts as near when its top edge is at
    /// most `threshold_px` below the viewport bottom
    Bounds {
        sentinel_top: f64,
        viewport_bottom: f64,
    },
}

impl Observation {
    /// Whether the sentinel is within `threshold_px` of the viewport
    pub fn is_near(&self, threshold_px: f64) -> bool {
        match *self {
            Observation::Intersecting(intersecting) => intersecting,
            Observation::Bounds {
                sentinel_top,
                viewport_bottom,
            } => sentinel_top - viewport_bottom <= threshold_px,
        }
    }
}

/// Outcome of one successful page load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedPage {
    /// Whether the source has pages after this one
    pub has_more: bool,
}

/// Input to [`InfiniteScroll::dispatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollEvent {
    Observed(Observation),
    /// The debounce deadline passed
    DebounceElapsed,
    /// Load without waiting for an observation
    LoadRequested,
    LoadSucceeded(LoadedPage),
    LoadFailed(OperationError),
    Retry,
    Reset,
    SetHasMore(bool),
    /// Caller-side loading flag, honoured by the concurrency guard
    SetExternalLoading(bool),
    SetEnabled(bool),
    Dispose,
}

/// Side effect requested from the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEffect {
    /// A debounce deadline was armed, replacing any previous one
    ArmDebounce(Instant),
    /// The armed debounce deadline was dropped
    ClearDebounce,
    /// Invoke the page loader once
    StartLoad,
}

/// Immutable view of the controller state
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollSnapshot {
    pub phase: ScrollPhase,
    pub has_more: bool,
    /// A load is outstanding, in the controller or reported by the caller
    pub is_loading: bool,
    pub enabled: bool,
    pub last_error: Option<OperationError>,
    pub debounce_armed: bool,
    /// Successful loads so far
    pub pages_loaded: u64,
    pub disposed: bool,
}

pub type ScrollTransition = Transition<ScrollSnapshot, ScrollEffect>;

/// Infinite-scroll controller state
#[derive(Debug, Clone)]
pub struct InfiniteScroll {
    threshold_px: f64,
    debounce: Duration,
    phase: ScrollPhase,
    has_more: bool,
    external_loading: bool,
    enabled: bool,
    last_error: Option<OperationError>,
    debounce_deadline: Option<Instant>,
    pages_loaded: u64,
    disposed: bool,
}

impl InfiniteScroll {
    /// Create a machine; starts Observing, Exhausted or Idle (disabled)
    pub fn new(config: &InfiniteScrollConfig, has_more: bool) -> Self {
        let mut machine = Self {
            threshold_px: config.threshold_px,
            debounce: config.debounce(),
            phase: ScrollPhase::Idle,
            has_more,
            external_loading: false,
            enabled: config.enabled,
            last_error: None,
            debounce_deadline: None,
            pages_loaded: 0,
            disposed: false,
        };
        machine.phase = machine.resting_phase();
        machine
    }

    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    /// The armed debounce deadline, if any
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    pub fn snapshot(&self) -> ScrollSnapshot {
        ScrollSnapshot {
            phase: self.phase,
            has_more: self.has_more,
            is_loading: self.is_loading(),
            enabled: self.enabled,
            last_error: self.last_error.clone(),
            debounce_armed: self.debounce_deadline.is_some(),
            pages_loaded: self.pages_loaded,
            disposed: self.disposed,
        }
    }

    /// Apply one event
    pub fn dispatch(&mut self, event: ScrollEvent, now: Instant) -> ScrollTransition {
        if self.disposed {
            return self.reject(GuardRejection::Disposed);
        }

        match event {
            ScrollEvent::Observed(observation) => self.on_observed(observation, now),
            ScrollEvent::DebounceElapsed => self.on_debounce_elapsed(now),
            ScrollEvent::LoadRequested => self.on_load_requested(),
            ScrollEvent::LoadSucceeded(page) => self.on_load_succeeded(page),
            ScrollEvent::LoadFailed(error) => self.on_load_failed(error),
            ScrollEvent::Retry => self.on_retry(),
            ScrollEvent::Reset => self.on_reset(),
            ScrollEvent::SetHasMore(has_more) => self.on_set_has_more(has_more),
            ScrollEvent::SetExternalLoading(loading) => {
                self.external_loading = loading;
                self.accept(None)
            }
            ScrollEvent::SetEnabled(enabled) => self.on_set_enabled(enabled),
            ScrollEvent::Dispose => {
                let effect = self.clear_debounce();
                self.disposed = true;
                self.accept(effect)
            }
        }
    }

    fn is_loading(&self) -> bool {
        self.phase == ScrollPhase::Loading || self.external_loading
    }

    fn resting_phase(&self) -> ScrollPhase {
        if !self.enabled {
            ScrollPhase::Idle
        } else if self.has_more {
            ScrollPhase::Observing
        } else {
            ScrollPhase::Exhausted
        }
    }

    /// Guards shared by every path that starts a load
    fn load_guard(&self) -> Result<(), GuardRejection> {
        if !self.enabled {
            Err(GuardRejection::Disabled)
        } else if self.is_loading() {
            Err(GuardRejection::AlreadyLoading)
        } else if !self.has_more {
            Err(GuardRejection::NoMorePages)
        } else {
            Ok(())
        }
    }

    fn on_observed(&mut self, observation: Observation, now: Instant) -> ScrollTransition {
        if self.phase == ScrollPhase::Error && self.enabled {
            return self.reject(GuardRejection::AwaitingRetry);
        }
        if let Err(reason) = self.load_guard() {
            return self.reject(reason);
        }
        if !observation.is_near(self.threshold_px) {
            return self.reject(GuardRejection::NotIntersecting);
        }

        let deadline = now + self.debounce;
        self.debounce_deadline = Some(deadline);
        self.accept(Some(ScrollEffect::ArmDebounce(deadline)))
    }

    fn on_debounce_elapsed(&mut self, now: Instant) -> ScrollTransition {
        match self.debounce_deadline {
            Some(deadline) if now >= deadline => self.debounce_deadline = None,
            _ => return self.accept(None),
        }

        // Conditions may have changed while the deadline was armed
        if self.phase == ScrollPhase::Error {
            return self.reject(GuardRejection::AwaitingRetry);
        }
        if let Err(reason) = self.load_guard() {
            return self.reject(reason);
        }
        self.start_load()
    }

    fn on_load_requested(&mut self) -> ScrollTransition {
        if let Err(reason) = self.load_guard() {
            return self.reject(reason);
        }
        self.debounce_deadline = None;
        self.start_load()
    }

    fn on_retry(&mut self) -> ScrollTransition {
        if self.phase != ScrollPhase::Error {
            return self.reject(GuardRejection::NotInError);
        }
        if let Err(reason) = self.load_guard() {
            return self.reject(reason);
        }
        self.debounce_deadline = None;
        self.start_load()
    }

    fn start_load(&mut self) -> ScrollTransition {
        self.phase = ScrollPhase::Loading;
        self.last_error = None;
        self.accept(Some(ScrollEffect::StartLoad))
    }

    fn on_load_succeeded(&mut self, page: LoadedPage) -> ScrollTransition {
        if self.phase != ScrollPhase::Loading {
            return self.accept(None);
        }
        self.has_more = page.has_more;
        self.pages_loaded += 1;
        self.phase = self.resting_phase();
        self.accept(None)
    }

    fn on_load_failed(&mut self, error: OperationError) -> ScrollTransition {
        if self.phase != ScrollPhase::Loading {
            return self.accept(None);
        }
        self.last_error = Some(error);
        self.phase = if self.enabled {
            ScrollPhase::Error
        } else {
            ScrollPhase::Idle
        };
        self.accept(None)
    }

    fn on_reset(&mut self) -> ScrollTransition {
        let effect = self.clear_debounce();
        self.last_error = None;
        if self.phase != ScrollPhase::Loading {
            self.phase = self.resting_phase();
        }
        self.accept(effect)
    }

    fn on_set_has_more(&mut self, has_more: bool) -> ScrollTransition {
        self.has_more = has_more;
        let effect = if has_more { None } else { self.clear_debounce() };
        if matches!(self.phase, ScrollPhase::Observing | ScrollPhase::Exhausted) {
            self.phase = self.resting_phase();
        }
        self.accept(effect)
    }

    fn on_set_enabled(&mut self, enabled: bool) -> ScrollTransition {
        if enabled == self.enabled {
            return self.accept(None);
        }
        self.enabled = enabled;

        let effect = if enabled {
            self.last_error = None;
            None
        } else {
            self.clear_debounce()
        };
        // An outstanding load settles on its own
        if self.phase != ScrollPhase::Loading {
            self.phase = self.resting_phase();
        }
        self.accept(effect)
    }

    fn clear_debounce(&mut self) -> Option<ScrollEffect> {
        self.debounce_deadline
            .take()
            .map(|_| ScrollEffect::ClearDebounce)
    }

    fn accept(&self, effect: Option<ScrollEffect>) -> ScrollTransition {
        Transition::accepted(self.snapshot(), effect)
    }

    fn reject(&self, reason: GuardRejection) -> ScrollTransition {
        Transition::rejected(self.snapshot(), reason)
    }
}
