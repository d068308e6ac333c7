//! Pull-to-refresh gesture state machine
//!
//! Interprets a touch stream on a scrollable surface. A pull starts only
//! when the surface is at the top, grows with `resistance` applied to the
//! finger travel, and triggers one refresh when released at or past the
//! threshold.

use serde::Serialize;

use crate::config::PullToRefreshConfig;
use crate::error::{GuardRejection, OperationError};
use crate::machine::Transition;

/// Gesture lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    Idle,
    Pulling,
    Refreshing,
}

/// Kind of touch event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
    Start,
    Move,
    End,
    /// The platform took the touch away (touchcancel)
    Cancel,
}

/// One touch event on the surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub kind: TouchKind,
    /// Vertical client coordinate of the primary touch point
    pub y: f64,
    /// Scroll offset of the surface when the event fired
    pub scroll_top: f64,
}

impl TouchEvent {
    pub fn start(y: f64, scroll_top: f64) -> Self {
        Self {
            kind: TouchKind::Start,
            y,
            scroll_top,
        }
    }

    pub fn moved(y: f64) -> Self {
        Self {
            kind: TouchKind::Move,
            y,
            scroll_top: 0.0,
        }
    }

    pub fn end() -> Self {
        Self {
            kind: TouchKind::End,
            y: 0.0,
            scroll_top: 0.0,
        }
    }

    pub fn cancel() -> Self {
        Self {
            kind: TouchKind::Cancel,
            y: 0.0,
            scroll_top: 0.0,
        }
    }
}

/// Input to [`PullToRefresh::dispatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    Touch(TouchEvent),
    /// Refresh without a gesture
    RefreshRequested,
    /// The refresh operation settled
    RefreshSettled(Result<(), OperationError>),
    SetEnabled(bool),
    Dispose,
}

/// Side effect requested from the surface or the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEffect {
    /// Suppress the native scroll for this touch move
    PreventDefault,
    /// Invoke the refresh operation once
    StartRefresh,
}

/// Coordinates of the gesture in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureState {
    pub phase: GesturePhase,
    pub start_y: f64,
    pub current_y: f64,
    pub pull_distance: f64,
    pub threshold: f64,
}

/// Immutable view of the machine
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSnapshot {
    pub phase: GesturePhase,
    pub start_y: f64,
    pub current_y: f64,
    pub pull_distance: f64,
    /// Releasing now would refresh
    pub can_refresh: bool,
    /// `min(pull_distance / threshold, 1)`
    pub progress: f64,
    pub enabled: bool,
    /// Failure of the last refresh, cleared when the next one starts
    pub last_error: Option<OperationError>,
    /// Refreshes started so far
    pub refresh_count: u64,
    pub disposed: bool,
}

impl GestureSnapshot {
    pub fn is_pulling(&self) -> bool {
        self.phase == GesturePhase::Pulling
    }

    pub fn is_refreshing(&self) -> bool {
        self.phase == GesturePhase::Refreshing
    }
}

pub type GestureTransition = Transition<GestureSnapshot, GestureEffect>;

impl Transition<GestureSnapshot, GestureEffect> {
    /// Whether the surface must prevent the default touch action
    pub fn prevent_default(&self) -> bool {
        self.effect == Some(GestureEffect::PreventDefault)
    }
}

/// Pull-to-refresh machine
#[derive(Debug, Clone)]
pub struct PullToRefresh {
    gesture: GestureState,
    resistance: f64,
    max_pull: f64,
    enabled: bool,
    last_error: Option<OperationError>,
    refresh_count: u64,
    disposed: bool,
}

impl PullToRefresh {
    pub fn new(config: &PullToRefreshConfig) -> Self {
        Self {
            gesture: GestureState {
                phase: GesturePhase::Idle,
                start_y: 0.0,
                current_y: 0.0,
                pull_distance: 0.0,
                threshold: config.threshold,
            },
            resistance: config.resistance,
            max_pull: config.max_pull(),
            enabled: config.enabled,
            last_error: None,
            refresh_count: 0,
            disposed: false,
        }
    }

    pub fn phase(&self) -> GesturePhase {
        self.gesture.phase
    }

    pub fn gesture(&self) -> &GestureState {
        &self.gesture
    }

    pub fn snapshot(&self) -> GestureSnapshot {
        let g = &self.gesture;
        GestureSnapshot {
            phase: g.phase,
            start_y: g.start_y,
            current_y: g.current_y,
            pull_distance: g.pull_distance,
            can_refresh: self.can_refresh(),
            progress: self.progress(),
            enabled: self.enabled,
            last_error: self.last_error.clone(),
            refresh_count: self.refresh_count,
            disposed: self.disposed,
        }
    }

    /// Apply one event
    pub fn dispatch(&mut self, event: GestureEvent) -> GestureTransition {
        if self.disposed {
            return self.reject(GuardRejection::Disposed);
        }

        match event {
            GestureEvent::Touch(touch) => match touch.kind {
                TouchKind::Start => self.on_touch_start(touch.y, touch.scroll_top),
                TouchKind::Move => self.on_touch_move(touch.y),
                TouchKind::End => self.on_touch_end(),
                TouchKind::Cancel => self.on_touch_cancel(),
            },
            GestureEvent::RefreshRequested => self.on_refresh_requested(),
            GestureEvent::RefreshSettled(result) => self.on_refresh_settled(result),
            GestureEvent::SetEnabled(enabled) => {
                self.enabled = enabled;
                if !enabled && self.gesture.phase == GesturePhase::Pulling {
                    self.release_to_idle();
                }
                self.accept(None)
            }
            GestureEvent::Dispose => {
                if self.gesture.phase == GesturePhase::Pulling {
                    self.release_to_idle();
                }
                self.disposed = true;
                self.accept(None)
            }
        }
    }

    /// `min(pull_distance / threshold, 1)`, never NaN for a zero threshold
    fn progress(&self) -> f64 {
        let g = &self.gesture;
        if self.can_refresh() {
            1.0
        } else if g.threshold > 0.0 {
            (g.pull_distance / g.threshold).min(1.0)
        } else {
            0.0
        }
    }

    fn can_refresh(&self) -> bool {
        self.gesture.phase == GesturePhase::Pulling
            && self.gesture.pull_distance >= self.gesture.threshold
    }

    fn on_touch_start(&mut self, y: f64, scroll_top: f64) -> GestureTransition {
        if !self.enabled {
            return self.reject(GuardRejection::Disabled);
        }
        if self.gesture.phase == GesturePhase::Refreshing {
            return self.reject(GuardRejection::AlreadyRefreshing);
        }
        if scroll_top > 0.0 {
            return self.reject(GuardRejection::NotAtTop);
        }

        // A second touch-start while pulling re-anchors the gesture
        self.gesture.phase = GesturePhase::Pulling;
        self.gesture.start_y = y;
        self.gesture.current_y = y;
        self.gesture.pull_distance = 0.0;
        self.accept(None)
    }

    fn on_touch_move(&mut self, y: f64) -> GestureTransition {
        if !self.enabled {
            return self.reject(GuardRejection::Disabled);
        }
        match self.gesture.phase {
            GesturePhase::Refreshing => return self.reject(GuardRejection::AlreadyRefreshing),
            GesturePhase::Idle => return self.reject(GuardRejection::NotPulling),
            GesturePhase::Pulling => {}
        }

        self.gesture.current_y = y;
        self.gesture.pull_distance = ((y - self.gesture.start_y) * self.resistance)
            .max(0.0)
            .min(self.max_pull);

        let effect = (self.gesture.pull_distance > 0.0).then_some(GestureEffect::PreventDefault);
        self.accept(effect)
    }

    fn on_touch_end(&mut self) -> GestureTransition {
        match self.gesture.phase {
            GesturePhase::Refreshing => return self.reject(GuardRejection::AlreadyRefreshing),
            GesturePhase::Idle => return self.reject(GuardRejection::NotPulling),
            GesturePhase::Pulling => {}
        }

        if self.can_refresh() {
            self.gesture.pull_distance = 0.0;
            self.start_refresh()
        } else {
            self.release_to_idle();
            self.reject(GuardRejection::BelowThreshold)
        }
    }

    fn on_touch_cancel(&mut self) -> GestureTransition {
        if self.gesture.phase != GesturePhase::Pulling {
            return self.reject(GuardRejection::NotPulling);
        }
        self.release_to_idle();
        self.accept(None)
    }

    fn on_refresh_requested(&mut self) -> GestureTransition {
        if !self.enabled {
            return self.reject(GuardRejection::Disabled);
        }
        if self.gesture.phase == GesturePhase::Refreshing {
            return self.reject(GuardRejection::AlreadyRefreshing);
        }
        self.gesture.pull_distance = 0.0;
        self.start_refresh()
    }

    fn on_refresh_settled(&mut self, result: Result<(), OperationError>) -> GestureTransition {
        if self.gesture.phase != GesturePhase::Refreshing {
            return self.accept(None);
        }
        self.gesture.phase = GesturePhase::Idle;
        self.last_error = result.err();
        self.accept(None)
    }

    fn start_refresh(&mut self) -> GestureTransition {
        self.gesture.phase = GesturePhase::Refreshing;
        self.last_error = None;
        self.refresh_count += 1;
        self.accept(Some(GestureEffect::StartRefresh))
    }

    fn release_to_idle(&mut self) {
        self.gesture.phase = GesturePhase::Idle;
        self.gesture.pull_distance = 0.0;
    }

    fn accept(&self, effect: Option<GestureEffect>) -> GestureTransition {
        Transition::accepted(self.snapshot(), effect)
    }

    fn reject(&self, reason: GuardRejection) -> GestureTransition {
        Transition::rejected(self.snapshot(), reason)
    }
}
