//! Gauges in the signed, unsigned and floating domains.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::metric::{GaugeMetric, GaugeValue, Metric};

macro_rules! gauge_metric {
    ($t:ty, $variant:ident) => {
        impl GaugeMetric for $t {
            fn value(&self) -> GaugeValue {
                GaugeValue::$variant(<$t>::value(self))
            }
        }

        impl Metric for $t {
            fn as_gauge(&self) -> Option<&dyn GaugeMetric> {
                Some(self)
            }
        }
    };
}

/// Signed gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    /// Creates a new instance at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value.
    pub fn update(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Current value.
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Read-only copy of the current value.
    pub fn snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot(self.value())
    }
}

/// Unsigned gauge.
#[derive(Debug, Default)]
pub struct UGauge {
    value: AtomicU64,
}

impl UGauge {
    /// Creates a new instance at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value.
    pub fn update(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Current value.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Read-only copy of the current value.
    pub fn snapshot(&self) -> UGaugeSnapshot {
        UGaugeSnapshot(self.value())
    }
}

/// Floating-point gauge, stored as raw bits.
#[derive(Debug)]
pub struct GaugeFloat64 {
    bits: AtomicU64,
}

impl Default for GaugeFloat64 {
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(0.0_f64.to_bits()),
        }
    }
}

impl GaugeFloat64 {
    /// Creates a new instance at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value.
    pub fn update(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Read-only copy of the current value.
    pub fn snapshot(&self) -> GaugeFloat64Snapshot {
        GaugeFloat64Snapshot(self.value())
    }
}

/// Read-only signed gauge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeSnapshot(pub i64);

impl GaugeSnapshot {
    /// Current value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Read-only unsigned gauge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UGaugeSnapshot(pub u64);

impl UGaugeSnapshot {
    /// Current value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Read-only floating gauge value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeFloat64Snapshot(pub f64);

impl GaugeFloat64Snapshot {
    /// Current value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

type Source<T> = Box<dyn Fn() -> T + Send + Sync>;

macro_rules! functional_gauge {
    ($(#[$doc:meta])* $name:ident, $t:ty, $snapshot:ident) => {
        $(#[$doc])*
        ///
        /// There is no `update`: the value always comes from the closure.
        pub struct $name {
            source: Source<$t>,
        }

        impl $name {
            /// Creates a gauge reading from `source`.
            pub fn new(source: impl Fn() -> $t + Send + Sync + 'static) -> Self {
                Self {
                    source: Box::new(source),
                }
            }

            /// Evaluates the closure.
            pub fn value(&self) -> $t {
                (self.source)()
            }

            /// Read-only copy of the current value.
            pub fn snapshot(&self) -> $snapshot {
                $snapshot(self.value())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        registry_constructors!($name, source: impl Fn() -> $t + Send + Sync + 'static);
    };
}

functional_gauge!(
    /// Signed gauge computed on every read.
    FunctionalGauge, i64, GaugeSnapshot
);
functional_gauge!(
    /// Unsigned gauge computed on every read.
    FunctionalUGauge, u64, UGaugeSnapshot
);
functional_gauge!(
    /// Floating gauge computed on every read.
    FunctionalGaugeFloat64, f64, GaugeFloat64Snapshot
);

/// Gauge reporting the difference between its last two updates.
#[derive(Debug, Default)]
pub struct Differ {
    samples: Mutex<(i64, i64)>,
}

impl Differ {
    /// Creates a new instance at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value.
    pub fn update(&self, value: i64) {
        let mut samples = self.samples.lock();
        samples.0 = samples.1;
        samples.1 = value;
    }

    /// Latest update minus the one before it.
    pub fn value(&self) -> i64 {
        let (prev, current) = *self.samples.lock();
        current.wrapping_sub(prev)
    }

    /// Read-only copy of the current value.
    pub fn snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot(self.value())
    }
}

registry_constructors!(Gauge);
registry_constructors!(UGauge);
registry_constructors!(GaugeFloat64);
registry_constructors!(Differ);

gauge_metric!(Gauge, Int);
gauge_metric!(UGauge, Uint);
gauge_metric!(GaugeFloat64, Float);
gauge_metric!(GaugeSnapshot, Int);
gauge_metric!(UGaugeSnapshot, Uint);
gauge_metric!(GaugeFloat64Snapshot, Float);
gauge_metric!(FunctionalGauge, Int);
gauge_metric!(FunctionalUGauge, Uint);
gauge_metric!(FunctionalGaugeFloat64, Float);
gauge_metric!(Differ, Int);
