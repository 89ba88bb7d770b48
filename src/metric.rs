//! Metric handles and the closed capability set.
//!
//! The registry stores every metric as an `Arc<dyn Metric>`. A metric
//! advertises what it can do through optional capability views; a value
//! that offers none of the recognized capabilities is refused at
//! registration time.
//!
//! Exporters receive the same handles while iterating the registry and pick
//! a rendering by asking for each view in turn:
//!
//! ```
//! use tagged_metrics::{Counter, Metric};
//!
//! let counter = Counter::new();
//! counter.add(3);
//!
//! let handle: &dyn Metric = &counter;
//! if let Some(c) = handle.as_counter() {
//!     assert_eq!(c.count(), 3);
//! }
//! assert!(handle.as_histogram().is_none());
//! ```

use std::any::Any;
use std::sync::Arc;

use serde::Serialize;

/// Which capability a registered metric is rendered as.
///
/// Variants are listed in the order [`Metric::kind`] checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// [`CounterMetric`].
    Counter,
    /// [`GaugeMetric`].
    Gauge,
    /// [`HistogramMetric`].
    Histogram,
    /// [`HealthcheckMetric`].
    Healthcheck,
    /// [`RateMetric`].
    Rate,
}

/// Current value of a gauge in its native numeric domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GaugeValue {
    /// Signed integer gauge.
    Int(i64),
    /// Unsigned integer gauge.
    Uint(u64),
    /// Floating-point gauge.
    Float(f64),
}

impl std::fmt::Display for GaugeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GaugeValue::Int(v) => write!(f, "{v}"),
            GaugeValue::Uint(v) => write!(f, "{v}"),
            GaugeValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Counter capability: a signed running count.
pub trait CounterMetric: Send + Sync {
    /// Returns the current count.
    fn count(&self) -> i64;
    /// Adds `delta` to the count.
    fn add(&self, delta: i64);
    /// Resets the count to zero, returning the count before the reset.
    fn clear(&self) -> i64;
}

/// Gauge capability: a single settable value.
pub trait GaugeMetric: Send + Sync {
    /// Current value.
    fn value(&self) -> GaugeValue;
}

/// Histogram capability with the numeric domain erased.
///
/// This is everything an exporter needs to render bucket counts: the
/// values, one label per bucket, the aggregate label and the per-bucket
/// boundary aliases (used for `le=<alias>` style tags). Typed boundaries are
/// available on [`crate::histogram::Histogram`].
pub trait HistogramMetric: Send + Sync {
    /// Copy of the bucket counters.
    fn values(&self) -> Vec<u64>;
    /// Replaces the bucket counters with zeros and returns the prior counters.
    fn clear(&self) -> Vec<u64>;
    /// Display label of each bucket.
    fn labels(&self) -> Vec<String>;
    /// Label naming the aggregate.
    fn name_total(&self) -> String;
    /// Canonical decimal alias of each boundary; the overflow boundary is `"inf"`.
    fn weights_aliases(&self) -> Vec<String>;
    /// True for cumulative (Prometheus style) bucket semantics.
    fn is_summed(&self) -> bool;
    /// Number of buckets, the overflow bucket included.
    fn len(&self) -> usize;
    /// True when there are no buckets.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Healthcheck capability: an up/down status.
pub trait HealthcheckMetric: Send + Sync {
    /// Re-evaluates the status.
    fn check(&self);
    /// Last recorded status.
    fn is_up(&self) -> bool;
    /// Forces the status up.
    fn healthy(&self);
    /// Forces the status down.
    fn unhealthy(&self);
}

/// Rate capability: delta between the last two samples and that delta per second.
pub trait RateMetric: Send + Sync {
    /// `(delta, delta per second)`.
    fn values(&self) -> (f64, f64);
    /// Returns the current pair and forgets both samples.
    fn clear(&self) -> (f64, f64);
}

/// Metrics owning background activity that must halt before removal.
pub trait Stoppable: Send + Sync {
    /// Halts the background activity. Must be idempotent.
    fn stop(&self);
}

#[doc(hidden)]
pub trait AsAny: Any + Send + Sync {
    /// Borrowed view for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Owned view for downcasting.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A value the registry can hold.
///
/// Implementors override the views they support; everything defaults to
/// `None`.
pub trait Metric: AsAny {
    /// Counter view.
    fn as_counter(&self) -> Option<&dyn CounterMetric> {
        None
    }

    /// Gauge view.
    fn as_gauge(&self) -> Option<&dyn GaugeMetric> {
        None
    }

    /// Histogram view.
    fn as_histogram(&self) -> Option<&dyn HistogramMetric> {
        None
    }

    /// Healthcheck view.
    fn as_healthcheck(&self) -> Option<&dyn HealthcheckMetric> {
        None
    }

    /// Rate view.
    fn as_rate(&self) -> Option<&dyn RateMetric> {
        None
    }

    /// Present when the metric runs background work.
    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        None
    }

    /// First recognized capability, or `None` when the value is not a metric.
    ///
    /// Stoppable alone does not make a metric.
    fn kind(&self) -> Option<MetricKind> {
        if self.as_counter().is_some() {
            Some(MetricKind::Counter)
        } else if self.as_gauge().is_some() {
            Some(MetricKind::Gauge)
        } else if self.as_histogram().is_some() {
            Some(MetricKind::Histogram)
        } else if self.as_healthcheck().is_some() {
            Some(MetricKind::Healthcheck)
        } else if self.as_rate().is_some() {
            Some(MetricKind::Rate)
        } else {
            None
        }
    }
}

impl dyn Metric {
    /// Recovers the concrete type of a shared handle.
    pub fn downcast<T: Metric>(self: Arc<Self>) -> Option<Arc<T>> {
        self.into_any().downcast::<T>().ok()
    }

    /// Borrows the concrete type behind a handle.
    pub fn downcast_ref<T: Metric>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// True when both handles point at the same instance.
    pub fn same_instance(a: &Arc<dyn Metric>, b: &Arc<dyn Metric>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
    }
}

impl std::fmt::Debug for dyn Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric").field("kind", &self.kind()).finish()
    }
}
