//! Single-deadline timer helpers shared by the controller drivers
//!
//! Each driver owns at most one armed deadline. Re-arming replaces the
//! previous deadline; the driver loop builds a fresh sleep from whatever
//! deadline is current on every iteration.

use tokio::time::{sleep_until, Instant};

/// Sleep until `deadline`, or forever when nothing is armed
pub(crate) async fn sleep_until_armed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// The earlier of two optional deadlines
pub(crate) fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
