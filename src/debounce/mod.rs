//! Debounce and throttle scheduling
//!
//! - [`gate`]: clock-free cores that decide when a value is emitted
//! - [`scheduler`]: actor drivers exposing value and callback forms
//! - [`search`]: a debounced search box built on the value form

pub mod gate;
pub mod scheduler;
pub mod search;

pub use gate::{Coalescer, Debouncer, PendingInvocation, Throttler};
pub use scheduler::{
    debounce, debounce_callback, throttle_callback, Debounced, DebouncedCallback, Throttled,
};
pub use search::{DebouncedSearch, SearchHandler, SearchState};
