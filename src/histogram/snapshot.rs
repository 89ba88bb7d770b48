//! Frozen histogram copies.

use super::domain::Boundary;
use super::storage::Boundaries;
use super::Histogram;
use crate::metric::{HistogramMetric, Metric};

/// Read-only copy of a histogram at one instant.
///
/// Later activity on the live histogram never shows through. Mutating a
/// snapshot is a programming error and panics.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot<T: Boundary> {
    boundaries: Boundaries<T>,
    labels: Vec<String>,
    total: String,
    buckets: Vec<u64>,
    summed: bool,
}

impl<T: Boundary> HistogramSnapshot<T> {
    pub(crate) fn new(
        boundaries: Boundaries<T>,
        labels: Vec<String>,
        total: String,
        buckets: Vec<u64>,
        summed: bool,
    ) -> Self {
        Self {
            boundaries,
            labels,
            total,
            buckets,
            summed,
        }
    }

    /// Bucket counters as captured.
    pub fn values(&self) -> Vec<u64> {
        self.buckets.clone()
    }

    /// Ascending boundaries, the overflow boundary last.
    pub fn weights(&self) -> &[T] {
        &self.boundaries.weights
    }

    /// Boundary aliases; the overflow boundary is `"inf"`.
    pub fn weights_aliases(&self) -> Vec<String> {
        self.boundaries.aliases.to_vec()
    }

    /// Display label of each bucket.
    pub fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    /// Label naming the aggregate.
    pub fn name_total(&self) -> String {
        self.total.clone()
    }

    /// True for cumulative bucket semantics.
    pub fn is_summed(&self) -> bool {
        self.summed
    }

    /// Number of buckets, the overflow bucket included.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Never true for a constructed histogram.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl<T: Boundary> HistogramMetric for HistogramSnapshot<T> {
    fn values(&self) -> Vec<u64> {
        self.buckets.clone()
    }

    fn clear(&self) -> Vec<u64> {
        panic!("clear called on a histogram snapshot");
    }

    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn name_total(&self) -> String {
        self.total.clone()
    }

    fn weights_aliases(&self) -> Vec<String> {
        HistogramSnapshot::weights_aliases(self)
    }

    fn is_summed(&self) -> bool {
        self.summed
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }
}

impl<T: Boundary> Histogram<T> for HistogramSnapshot<T> {
    fn add(&self, _value: T) {
        panic!("add called on a histogram snapshot");
    }

    fn weights(&self) -> Vec<T> {
        self.boundaries.weights.to_vec()
    }

    fn snapshot(&self) -> HistogramSnapshot<T> {
        self.clone()
    }
}

impl<T: Boundary> Metric for HistogramSnapshot<T> {
    fn as_histogram(&self) -> Option<&dyn HistogramMetric> {
        Some(self)
    }
}
