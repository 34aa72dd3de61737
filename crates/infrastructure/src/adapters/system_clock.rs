//! Wall-clock time source.

use chrono::{DateTime, Utc};
use neocrm_application::ports::Clock;

/// [`Clock`] reading the system time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
