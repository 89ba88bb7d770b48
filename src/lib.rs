//! Tagged Metrics Library
//!
//! An in-process metrics core: a concurrent registry of named or tagged
//! metrics, and a bucketed histogram engine over signed, unsigned and
//! floating-point boundaries.
//!
//! # Architecture
//!
//! ```text
//! scalar (counters, gauges, rates, meters) ─┐
//!                                           ├─→ registry ─→ reporters (Registry::each)
//! histogram (fixed / weighted buckets)     ─┘
//! ```
//!
//! Metrics own their synchronization. The registry's lock guards membership
//! only, so contention on one metric never blocks another or the registry.
//!
//! # Design Principles
//!
//! - **Closed capability set**: a metric is accepted only if it offers one of
//!   the views in [`Metric`]; exporters pick a rendering from those views
//! - **Lazy registration**: factories run only when an identity is absent,
//!   and every caller gets the single winning instance
//! - **Delta flushing**: `clear` swaps in zeroed state and hands back the
//!   previous state
//! - **Fail fast on misuse**: malformed histogram boundaries and mutating a
//!   snapshot panic; registration problems are returned as errors
//!
//! # Example
//!
//! ```
//! use tagged_metrics::{tags, BucketHistogram, Counter, Registry};
//!
//! let registry = Registry::new();
//!
//! let requests = Counter::get_or_register(&registry, "requests").unwrap();
//! requests.inc();
//!
//! let latency = BucketHistogram::<i64>::get_or_register_fixed_tagged(
//!     &registry,
//!     "latency",
//!     &tags([("host", "web1")]),
//!     10,
//!     50,
//!     10,
//! )
//! .unwrap();
//! latency.add(25);
//!
//! registry
//!     .each::<(), _>(
//!         |name, tags, _, metric| {
//!             if let Some(h) = metric.as_histogram() {
//!                 assert_eq!(format!("{name}{tags}"), "latency;host=web1");
//!                 assert_eq!(h.values(), vec![0, 0, 1, 0, 0, 0]);
//!             }
//!             Ok(())
//!         },
//!         true,
//!     )
//!     .unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod histogram;
pub mod metric;
pub mod registry;
pub mod scalar;

// Re-export commonly used types at crate root
pub use config::{ConfigError, FileConfig, HistogramConfig};
pub use histogram::{Boundary, BucketHistogram, Histogram, HistogramSnapshot};
pub use metric::{
    CounterMetric, GaugeMetric, GaugeValue, HealthcheckMetric, HistogramMetric, Metric,
    MetricKind, RateMetric, Stoppable,
};
pub use registry::{
    canonical_tags, default_registry, merge_tags, tags, Reading, Registry, RegistryError, Tags,
};
pub use scalar::{
    Counter, DownCounter, Gauge, GaugeFloat64, Healthcheck, Meter, Rate, UGauge,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
