//! Rate of change between the two latest samples.

use parking_lot::Mutex;

use crate::metric::{Metric, RateMetric};

const NANOS_PER_SEC: f64 = 1e9;

#[derive(Debug, Default, Clone, Copy)]
struct Samples {
    prev: f64,
    prev_ts: i64,
    value: f64,
    value_ts: i64,
}

impl Samples {
    /// Delta and elapsed nanoseconds, zero until two samples exist.
    fn delta(&self) -> (f64, f64) {
        if self.prev_ts > 0 {
            (
                self.value - self.prev,
                self.value_ts.wrapping_sub(self.prev_ts) as f64,
            )
        } else {
            (0.0, 0.0)
        }
    }
}

/// Tracks a sampled value and how fast it changes.
///
/// Each `update` carries a wall-clock timestamp in nanoseconds; the rate is
/// the delta between the last two samples scaled to one second.
#[derive(Debug, Default)]
pub struct Rate {
    samples: Mutex<Samples>,
}

impl Rate {
    /// Creates a rate with no samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` observed at `timestamp_ns`.
    pub fn update(&self, value: f64, timestamp_ns: i64) {
        let mut samples = self.samples.lock();
        samples.prev = samples.value;
        samples.prev_ts = samples.value_ts;
        samples.value = value;
        samples.value_ts = timestamp_ns;
    }

    /// `(delta, delta per second)`, or zeros while fewer than two samples
    /// are known or no time has passed.
    pub fn values(&self) -> (f64, f64) {
        let (delta, elapsed) = self.samples.lock().delta();
        if elapsed == 0.0 {
            return (0.0, 0.0);
        }
        (delta, NANOS_PER_SEC * delta / elapsed)
    }

    /// Returns the pair and forgets both samples.
    ///
    /// A non-positive delta is reported as zeros.
    pub fn clear(&self) -> (f64, f64) {
        let (delta, elapsed) = std::mem::take(&mut *self.samples.lock()).delta();
        if delta <= 0.0 || elapsed == 0.0 {
            return (0.0, 0.0);
        }
        (delta, NANOS_PER_SEC * delta / elapsed)
    }

    /// Read-only copy of the current pair.
    pub fn snapshot(&self) -> RateSnapshot {
        let (delta, per_second) = self.values();
        RateSnapshot { delta, per_second }
    }
}

registry_constructors!(Rate);

impl RateMetric for Rate {
    fn values(&self) -> (f64, f64) {
        Rate::values(self)
    }

    fn clear(&self) -> (f64, f64) {
        Rate::clear(self)
    }
}

impl Metric for Rate {
    fn as_rate(&self) -> Option<&dyn RateMetric> {
        Some(self)
    }
}

/// Read-only rate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSnapshot {
    /// Difference between the last two samples.
    pub delta: f64,
    /// The same difference scaled to one second.
    pub per_second: f64,
}

impl RateSnapshot {
    /// `(delta, delta per second)` as captured.
    pub fn values(&self) -> (f64, f64) {
        (self.delta, self.per_second)
    }
}

impl RateMetric for RateSnapshot {
    fn values(&self) -> (f64, f64) {
        RateSnapshot::values(self)
    }

    fn clear(&self) -> (f64, f64) {
        panic!("clear called on a rate snapshot");
    }
}

impl Metric for RateSnapshot {
    fn as_rate(&self) -> Option<&dyn RateMetric> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1_000_000_000;

    #[test]
    fn test_rate_needs_two_samples() {
        let r = Rate::new();
        assert_eq!(r.values(), (0.0, 0.0));
        r.update(10.0, SEC);
        assert_eq!(r.values(), (0.0, 0.0));
        r.update(40.0, 3 * SEC);
        assert_eq!(r.values(), (30.0, 15.0));
    }

    #[test]
    fn test_rate_clear_resets() {
        let r = Rate::new();
        r.update(10.0, SEC);
        r.update(15.0, 2 * SEC);
        assert_eq!(r.clear(), (5.0, 5.0));
        assert_eq!(r.values(), (0.0, 0.0));
        r.update(1.0, 3 * SEC);
        assert_eq!(r.values(), (0.0, 0.0));
    }

    #[test]
    fn test_rate_clear_negative_delta() {
        let r = Rate::new();
        r.update(10.0, SEC);
        r.update(4.0, 2 * SEC);
        assert_eq!(r.values(), (-6.0, -6.0));
        assert_eq!(r.clear(), (0.0, 0.0));
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let r = Rate::new();
        r.update(1.0, SEC);
        r.update(3.0, 2 * SEC);
        let snap = r.snapshot();
        r.update(100.0, 3 * SEC);
        assert_eq!(snap.values(), (2.0, 2.0));
    }

    #[test]
    #[should_panic(expected = "clear called on a rate snapshot")]
    fn test_snapshot_clear_panics() {
        RateMetric::clear(&Rate::new().snapshot());
    }
}
