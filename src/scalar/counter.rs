//! Counters.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::metric::{CounterMetric, Metric};

/// Monotonic-by-convention signed counter.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Creates a new instance at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Adds one.
    pub fn inc(&self) {
        self.add(1);
    }

    /// Adds `delta`.
    pub fn add(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    /// Resets to zero and returns the count before the reset.
    pub fn clear(&self) -> i64 {
        self.count.swap(0, Ordering::Relaxed)
    }

    /// Read-only copy of the current value.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot(self.count())
    }
}

registry_constructors!(Counter);

impl CounterMetric for Counter {
    fn count(&self) -> i64 {
        Counter::count(self)
    }

    fn add(&self, delta: i64) {
        Counter::add(self, delta)
    }

    fn clear(&self) -> i64 {
        Counter::clear(self)
    }
}

impl Metric for Counter {
    fn as_counter(&self) -> Option<&dyn CounterMetric> {
        Some(self)
    }
}

/// Counter that is expected to move in both directions.
#[derive(Debug, Default)]
pub struct DownCounter {
    inner: Counter,
}

impl DownCounter {
    /// Creates a new instance at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    pub fn count(&self) -> i64 {
        self.inner.count()
    }

    /// Adds one.
    pub fn inc(&self) {
        self.inner.add(1);
    }

    /// Adds `delta`.
    pub fn add(&self, delta: i64) {
        self.inner.add(delta);
    }

    /// Subtracts one.
    pub fn dec(&self) {
        self.inner.add(-1);
    }

    /// Subtracts `delta`.
    pub fn sub(&self, delta: i64) {
        self.inner.add(delta.wrapping_neg());
    }

    /// Resets to zero and returns the count before the reset.
    pub fn clear(&self) -> i64 {
        self.inner.clear()
    }

    /// Read-only copy of the current value.
    pub fn snapshot(&self) -> CounterSnapshot {
        self.inner.snapshot()
    }
}

registry_constructors!(DownCounter);

impl CounterMetric for DownCounter {
    fn count(&self) -> i64 {
        self.inner.count()
    }

    fn add(&self, delta: i64) {
        self.inner.add(delta)
    }

    fn clear(&self) -> i64 {
        self.inner.clear()
    }
}

impl Metric for DownCounter {
    fn as_counter(&self) -> Option<&dyn CounterMetric> {
        Some(self)
    }
}

/// Read-only counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot(pub i64);

impl CounterSnapshot {
    /// Current count.
    pub fn count(&self) -> i64 {
        self.0
    }
}

impl CounterMetric for CounterSnapshot {
    fn count(&self) -> i64 {
        self.0
    }

    fn add(&self, _delta: i64) {
        panic!("add called on a counter snapshot");
    }

    fn clear(&self) -> i64 {
        panic!("clear called on a counter snapshot");
    }
}

impl Metric for CounterSnapshot {
    fn as_counter(&self) -> Option<&dyn CounterMetric> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_counter_clear_returns_prior() {
        let c = Counter::new();
        c.add(2);
        c.inc();
        assert_eq!(c.clear(), 3);
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn test_counter_snapshot_is_frozen() {
        let c = Counter::new();
        c.inc();
        let snap = c.snapshot();
        c.inc();
        assert_eq!(snap.count(), 1);
    }

    #[test]
    fn test_down_counter() {
        let c = DownCounter::new();
        c.sub(2);
        assert_eq!(c.count(), -2);
        c.dec();
        c.add(4);
        assert_eq!(c.count(), 1);
        assert_eq!(c.clear(), 1);
    }

    #[test]
    #[should_panic(expected = "add called on a counter snapshot")]
    fn test_snapshot_add_panics() {
        CounterMetric::add(&CounterSnapshot(1), 1);
    }

    #[test]
    fn test_get_or_register_counter() {
        let registry = Registry::new();
        Counter::new_registered(&registry, "foo").unwrap().add(47);
        assert_eq!(Counter::get_or_register(&registry, "foo").unwrap().count(), 47);
        assert!(DownCounter::get_or_register(&registry, "foo").is_err());
    }
}
