use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use std::sync::{Mutex, PoisonError};

/// Source of the current instant
///
/// Every "now" and "today" in the engine is derived from a `Clock` and an
/// explicit reference timezone, never from the host's local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the running host, in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant
///
/// Used to evaluate access at an arbitrary point in time and in tests.
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Move the clock to a new instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Advance the clock by a duration
    pub fn advance(&self, by: chrono::Duration) {
        let mut instant = self.instant.lock().unwrap_or_else(PoisonError::into_inner);
        *instant += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An instant as read off the wall clock of a reference timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalInstant {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl LocalInstant {
    /// Project a UTC instant into the given timezone
    pub fn at(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self {
            date: local.date_naive(),
            time: local.time(),
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    /// Saturday or Sunday on the local calendar
    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
