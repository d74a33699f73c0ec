//! Time source for token validity windows.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Source of "now" for token encoding and expiry checks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Second resolution.
///
/// Intended for tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    unix_seconds: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            unix_seconds: AtomicI64::new(start.timestamp()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.unix_seconds.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.unix_seconds.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.unix_seconds.load(Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
