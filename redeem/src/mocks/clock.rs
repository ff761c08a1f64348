//! Fixed clock for deterministic timestamps.

use crate::providers::Clock;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Clock that returns a settable instant.
///
/// Clones share the same time, so a test can hold one handle and advance
/// the clock seen by the registry or coordinator.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Create a clock frozen at `time`.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: TimeDelta) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(test_time())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 2025-01-01T00:00:00Z, the default time of [`FixedClock`].
#[must_use]
pub fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = FixedClock::default();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), test_time());
    }

    #[test]
    fn test_advance_is_shared_between_clones() {
        let clock = FixedClock::default();
        let handle = clock.clone();
        handle.advance(TimeDelta::seconds(90));
        assert_eq!(clock.now(), test_time() + TimeDelta::seconds(90));
    }
}
