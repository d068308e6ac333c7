//! Viewport-proximity triggered infinite scroll
//!
//! [`InfiniteScroll`] is the pure state machine; [`InfiniteScrollController`]
//! runs it on a task with a debounce timer and a [`PageLoader`].
//! [`VirtualList`] computes the mounted slice of a virtualized list.

pub mod controller;
pub mod machine;
pub mod window;

pub use controller::{InfiniteScrollController, PageLoader};
pub use machine::{
    InfiniteScroll, LoadedPage, Observation, ScrollEffect, ScrollEvent, ScrollPhase,
    ScrollSnapshot, ScrollTransition,
};
pub use window::{VirtualList, VisibleWindow};
