//! Wall-clock access for scheduling decisions.

use chrono::{DateTime, TimeDelta, Utc};

/// Source of "now" for the scheduler.
///
/// The schedule builder, dispatchers and pool controller read time only
/// through this trait, so a run can be driven by a shifted clock in tests.
pub trait Clock: Send + Sync + 'static {
    /// Current timezone-aware instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that runs a fixed offset ahead of (or behind) the system clock.
#[derive(Debug, Clone, Copy)]
pub struct OffsetClock {
    offset: TimeDelta,
}

impl OffsetClock {
    /// Create a clock shifted by `offset` relative to [`SystemClock`].
    #[must_use]
    pub const fn new(offset: TimeDelta) -> Self {
        Self { offset }
    }
}

impl Clock for OffsetClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.offset
    }
}

/// Convert a signed chrono delta to fractional seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn delta_secs(delta: TimeDelta) -> f64 {
    delta
        .num_microseconds()
        .map_or_else(|| delta.num_milliseconds() as f64 / 1_000.0, |us| us as f64 / 1_000_000.0)
}

/// Convert fractional seconds to a chrono delta, rounded to the microsecond.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn secs_to_delta(secs: f64) -> TimeDelta {
    TimeDelta::microseconds((secs * 1_000_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_clock_runs_ahead() {
        let clock = OffsetClock::new(TimeDelta::seconds(3600));
        let diff = clock.now() - SystemClock.now();
        assert!(diff > TimeDelta::seconds(3599));
    }

    #[test]
    fn test_delta_conversions() {
        assert!((delta_secs(TimeDelta::milliseconds(-500)) + 0.5).abs() < f64::EPSILON);
        assert_eq!(secs_to_delta(-0.5), TimeDelta::milliseconds(-500));
        assert_eq!(secs_to_delta(1.25), TimeDelta::milliseconds(1250));
    }
}
