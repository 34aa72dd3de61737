//! Third-party OAuth connection upkeep.

mod refresher;
mod sweeper;

pub use refresher::{DEFAULT_RETENTION, DEFAULT_SAFETY_MARGIN, OAuthRefresher, SweepReport};
pub use sweeper::{SweeperHandle, spawn_sweeper};
