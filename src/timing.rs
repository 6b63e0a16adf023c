//! Span timing: moments, clocks and backdating.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;

/// Nanoseconds per millisecond.
pub const MSEC_TO_NSEC: f64 = 1_000_000.0;

/// A point in time as two nanosecond counts: wall clock since the Unix
/// epoch, and a monotonic reading for precise durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Moment {
    pub epoch_nanos: i64,
    pub monotonic_nanos: i64,
}

impl Moment {
    pub fn new(epoch_nanos: i64, monotonic_nanos: i64) -> Self {
        Self {
            epoch_nanos,
            monotonic_nanos,
        }
    }
}

/// The moment a query that took `elapsed_ms` and finished at `now` started.
///
/// The elapsed time is truncated to whole nanoseconds and subtracted from
/// each component on its own. A non-finite elapsed time leaves `now` as is.
pub fn backdate(now: Moment, elapsed_ms: f64) -> Moment {
    if !elapsed_ms.is_finite() {
        return now;
    }
    let elapsed_nanos = (elapsed_ms * MSEC_TO_NSEC) as i64;
    Moment {
        epoch_nanos: now.epoch_nanos.saturating_sub(elapsed_nanos),
        monotonic_nanos: now.monotonic_nanos.saturating_sub(elapsed_nanos),
    }
}

/// Source of the current moment.
pub trait Clock {
    fn now(&self) -> Moment;
}

static MONOTONIC_ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// Reads the system clock. The monotonic component counts from the first
/// time any `SystemClock` is read in this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Moment {
        let anchor = *MONOTONIC_ANCHOR;
        let epoch_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        let monotonic_nanos = i64::try_from(anchor.elapsed().as_nanos()).unwrap_or(i64::MAX);
        Moment {
            epoch_nanos,
            monotonic_nanos,
        }
    }
}

/// A clock stuck at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub Moment);

impl Clock for FixedClock {
    fn now(&self) -> Moment {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Moment {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_elapsed_is_identity() {
        let now = Moment::new(1_700_000_000_000_000_000, 5_000_000_000);
        assert_eq!(backdate(now, 0.0), now);
    }

    #[test]
    fn test_backdate_subtracts_from_both() {
        let now = Moment::new(1_700_000_000_000_000_000, 5_000_000_000);
        let start = backdate(now, 12.5);
        assert_eq!(start.epoch_nanos, 1_700_000_000_000_000_000 - 12_500_000);
        assert_eq!(start.monotonic_nanos, 5_000_000_000 - 12_500_000);
    }

    #[test]
    fn test_backdate_truncates_sub_nanosecond() {
        let now = Moment::new(1_000, 1_000);
        assert_eq!(backdate(now, 0.0000009), now);
    }

    #[test]
    fn test_non_finite_elapsed_is_identity() {
        let now = Moment::new(1_000, 1_000);
        for elapsed in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(backdate(now, elapsed), now);
        }
    }

    #[test]
    fn test_monotonic_may_go_negative() {
        let now = Moment::new(10_000_000, 1_000);
        let start = backdate(now, 1.0);
        assert_eq!(start.epoch_nanos, 9_000_000);
        assert_eq!(start.monotonic_nanos, 1_000 - 1_000_000);
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(first.epoch_nanos > 0);
        assert!(second.monotonic_nanos >= first.monotonic_nanos);
    }
}
