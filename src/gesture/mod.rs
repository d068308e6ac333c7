//! Touch-driven pull-to-refresh
//!
//! [`PullToRefresh`] interprets touch events; [`PullToRefreshController`]
//! runs it on a task and invokes a [`RefreshHandler`].

pub mod controller;
pub mod machine;

pub use controller::{PullToRefreshController, RefreshHandler};
pub use machine::{
    GestureEffect, GestureEvent, GesturePhase, GestureSnapshot, GestureState, GestureTransition,
    PullToRefresh, TouchEvent, TouchKind,
};
