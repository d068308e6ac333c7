//! feedflow - Interaction orchestration for content feeds
//!
//! This crate provides the controllers that sit between user input and the
//! async operations of a content feed: a debounce/throttle scheduler, a
//! retry executor with exponential backoff, an infinite-scroll controller
//! and a pull-to-refresh gesture machine.
//!
//! Every controller is a pure state machine (`dispatch(event) -> Transition`)
//! paired with a tokio actor that owns it, its single timer and its
//! in-flight operation.

pub mod config;
pub mod debounce;
pub mod error;
pub mod gesture;
pub mod machine;
pub mod replay;
pub mod retry;
pub mod scroll;
pub mod telemetry;
mod timer;
