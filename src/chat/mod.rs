//! Session lifecycle and turn execution.

pub mod sessions;
pub mod turns;

pub use sessions::{display_label, SessionListing, SessionManager};
pub use turns::{TurnCoordinator, TurnOutcome, TurnRequest};

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the millisecond precision the stores persist.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
