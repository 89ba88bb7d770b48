//! Histogram engine
//!
//! Bucketed histograms over signed, unsigned and floating boundaries, with
//! exclusive or cumulative bucket semantics. Boundaries come either from a
//! fixed-width range (classified in O(1)) or from an explicit set
//! (classified by binary search). Every histogram ends in an overflow
//! bucket aliased `"inf"`.

mod bucket;
mod domain;
mod snapshot;
mod storage;

pub use bucket::BucketHistogram;
pub use domain::Boundary;
pub use snapshot::HistogramSnapshot;
pub use storage::{DEFAULT_TOTAL, INF_ALIAS};

use crate::metric::HistogramMetric;

/// Histogram with typed boundaries.
pub trait Histogram<T: Boundary>: HistogramMetric {
    /// Records one observation.
    fn add(&self, value: T);
    /// Ascending boundaries, the overflow boundary last.
    fn weights(&self) -> Vec<T>;
    /// Immutable point-in-time copy.
    fn snapshot(&self) -> HistogramSnapshot<T>;
}
