//! Cycle time

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// The instant a cycle evaluates at, in both UTC and house-local time
///
/// Timers and timestamps use `now`; the time window and the seasonal band
/// use `local`. Tests build clocks directly instead of reading the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleClock {
    pub now: DateTime<Utc>,
    pub local: NaiveDateTime,
}

impl CycleClock {
    pub fn new(now: DateTime<Utc>, local: NaiveDateTime) -> Self {
        Self { now, local }
    }

    /// The current system time
    pub fn system() -> Self {
        let local = Local::now();
        Self {
            now: local.with_timezone(&Utc),
            local: local.naive_local(),
        }
    }

    /// A clock whose local time equals its UTC time
    pub fn at_utc(now: DateTime<Utc>) -> Self {
        Self {
            now,
            local: now.naive_utc(),
        }
    }
}
