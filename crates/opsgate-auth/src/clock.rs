//! Wall-clock source for grant expiry.
//!
//! Grant validity is always evaluated against [`Clock::now`] at call time.
//! Tests swap in a [`ManualClock`] to hit exact expiry boundaries.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// System time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Millisecond resolution.
///
/// # Example
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use opsgate_auth::{Clock, ManualClock};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
/// let clock = ManualClock::new(t0);
/// clock.advance(Duration::minutes(15));
/// assert_eq!(clock.now(), t0 + Duration::minutes(15));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Sets the current time.
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Moves the clock forward (or backward for a negative delta).
    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}
