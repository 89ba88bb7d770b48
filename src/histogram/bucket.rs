//! Live bucket histograms.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::domain::Boundary;
use super::snapshot::HistogramSnapshot;
use super::storage::{Boundaries, LabelSet};
use super::Histogram;
use crate::metric::{HistogramMetric, Metric};
use crate::registry::{Registry, RegistryError, Tags};

#[derive(Debug, Clone, Copy)]
enum Layout<T> {
    /// Evenly spaced boundaries, classified analytically.
    Fixed { start: T, width: T },
    /// Arbitrary boundaries, classified by binary search.
    Weighted,
}

/// Histogram counting observations into boundary buckets.
///
/// Exclusive histograms count each observation once, in the bucket of the
/// first boundary at or above it. Summed histograms count it in that bucket
/// and every bucket above, so each bucket reads "observations at or below
/// this boundary" and the overflow bucket holds the total.
///
/// ```
/// use tagged_metrics::BucketHistogram;
///
/// let latency = BucketHistogram::<i64>::weighted(&[1, 2, 5, 8, 20], &[]);
/// for v in [0, 1, 2, 3, 5, 6, 7, 8, 9, 20, 21, 100] {
///     latency.add(v);
/// }
/// assert_eq!(latency.values(), vec![2, 1, 2, 3, 2, 2]);
/// assert_eq!(latency.weights_aliases()[5], "inf");
/// ```
#[derive(Debug)]
pub struct BucketHistogram<T: Boundary> {
    layout: Layout<T>,
    boundaries: Boundaries<T>,
    labels: RwLock<LabelSet>,
    buckets: Mutex<Vec<u64>>,
    summed: bool,
}

impl<T: Boundary> BucketHistogram<T> {
    /// Exclusive histogram with boundaries every `width` from `start`
    /// through `end`, plus an overflow bucket.
    ///
    /// Reversed endpoints are swapped and a negative width is negated.
    ///
    /// # Panics
    ///
    /// Panics on a zero width, or for floats a non-finite range.
    pub fn fixed(start: T, end: T, width: T) -> Self {
        Self::new_fixed(start, end, width, false)
    }

    /// Cumulative form of [`BucketHistogram::fixed`].
    pub fn fixed_summed(start: T, end: T, width: T) -> Self {
        Self::new_fixed(start, end, width, true)
    }

    /// Exclusive histogram over explicit boundaries.
    ///
    /// The boundaries are sorted and an overflow boundary above the largest
    /// one is appended. `labels` overrides the first labels in ascending
    /// boundary order; the entry at the overflow position names the
    /// overflow bucket.
    ///
    /// # Panics
    ///
    /// Panics on an empty boundary set, a duplicate, or NaN.
    pub fn weighted(weights: &[T], labels: &[&str]) -> Self {
        Self::new_weighted(weights, labels, false)
    }

    /// Cumulative form of [`BucketHistogram::weighted`].
    pub fn weighted_summed(weights: &[T], labels: &[&str]) -> Self {
        Self::new_weighted(weights, labels, true)
    }

    fn new_fixed(start: T, end: T, width: T, summed: bool) -> Self {
        let (start, end, width) = T::normalize_range(start, end, width);
        let boundaries = Boundaries::fixed(start, end, width);
        Self::build(
            Layout::Fixed { start, width },
            boundaries,
            LabelSet::default(),
            summed,
        )
    }

    fn new_weighted(weights: &[T], labels: &[&str], summed: bool) -> Self {
        Self::build(
            Layout::Weighted,
            Boundaries::explicit(weights),
            LabelSet::with_overrides(labels),
            summed,
        )
    }

    fn build(layout: Layout<T>, boundaries: Boundaries<T>, labels: LabelSet, summed: bool) -> Self {
        let buckets = vec![0; boundaries.len()];
        Self {
            layout,
            boundaries,
            labels: RwLock::new(labels),
            buckets: Mutex::new(buckets),
            summed,
        }
    }

    /// Records one observation.
    pub fn add(&self, value: T) {
        let idx = self.classify(value);
        let mut buckets = self.buckets.lock();
        if self.summed {
            for bucket in &mut buckets[idx..] {
                *bucket += 1;
            }
        } else {
            buckets[idx] += 1;
        }
    }

    fn classify(&self, value: T) -> usize {
        match self.layout {
            Layout::Fixed { start, width } => {
                T::fixed_index(value, start, width, self.boundaries.len() - 1)
            }
            Layout::Weighted => self.boundaries.lower_bound(value),
        }
    }

    /// Copy of the bucket counters.
    pub fn values(&self) -> Vec<u64> {
        self.buckets.lock().clone()
    }

    /// Swaps in zeroed counters and returns the previous ones.
    pub fn clear(&self) -> Vec<u64> {
        let fresh = vec![0; self.boundaries.len()];
        std::mem::replace(&mut *self.buckets.lock(), fresh)
    }

    /// Immutable copy of boundaries, labels and current counters.
    pub fn snapshot(&self) -> HistogramSnapshot<T> {
        let (labels, total) = {
            let set = self.labels.read();
            (set.render(&self.boundaries.aliases), set.total().to_string())
        };
        HistogramSnapshot::new(
            self.boundaries.clone(),
            labels,
            total,
            self.values(),
            self.summed,
        )
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
        self.labels.read().render(&self.boundaries.aliases)
    }

    /// Label naming the aggregate.
    pub fn name_total(&self) -> String {
        self.labels.read().total().to_string()
    }

    /// True for cumulative bucket semantics.
    pub fn is_summed(&self) -> bool {
        self.summed
    }

    /// Number of buckets, the overflow bucket included.
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Never true for a constructed histogram.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the prefix of every label not explicitly overridden.
    pub fn set_label_prefix(&self, prefix: &str) -> &Self {
        self.labels.write().set_prefix(prefix);
        self
    }

    /// Replaces the explicit label overrides.
    pub fn set_labels(&self, labels: &[&str]) -> &Self {
        self.labels.write().set_overrides(labels);
        self
    }

    /// Sets the label naming the aggregate.
    pub fn set_name_total(&self, total: &str) -> &Self {
        self.labels.write().set_total(total);
        self
    }

    /// Registers `self` under `name`.
    pub fn register(self, registry: &Registry, name: &str) -> Result<Arc<Self>, RegistryError> {
        let histogram = Arc::new(self);
        registry.register(name, histogram.clone())?;
        Ok(histogram)
    }

    /// Registers `self` under `name` and `tags`.
    pub fn register_tagged(
        self,
        registry: &Registry,
        name: &str,
        tags: &Tags,
    ) -> Result<Arc<Self>, RegistryError> {
        let histogram = Arc::new(self);
        registry.register_tagged(name, tags, histogram.clone())?;
        Ok(histogram)
    }

    /// Builds and registers an exclusive fixed-width histogram.
    pub fn new_registered_fixed(
        registry: &Registry,
        name: &str,
        start: T,
        end: T,
        width: T,
    ) -> Result<Arc<Self>, RegistryError> {
        Self::fixed(start, end, width).register(registry, name)
    }

    /// Builds and registers an exclusive histogram over explicit boundaries.
    pub fn new_registered_weighted(
        registry: &Registry,
        name: &str,
        weights: &[T],
        labels: &[&str],
    ) -> Result<Arc<Self>, RegistryError> {
        Self::weighted(weights, labels).register(registry, name)
    }

    /// Returns the histogram registered under `name`, building an exclusive
    /// fixed-width one only if absent.
    pub fn get_or_register_fixed(
        registry: &Registry,
        name: &str,
        start: T,
        end: T,
        width: T,
    ) -> Result<Arc<Self>, RegistryError> {
        registry.get_or_register_as(name, || Self::fixed(start, end, width))
    }

    /// Tagged form of [`BucketHistogram::get_or_register_fixed`].
    pub fn get_or_register_fixed_tagged(
        registry: &Registry,
        name: &str,
        tags: &Tags,
        start: T,
        end: T,
        width: T,
    ) -> Result<Arc<Self>, RegistryError> {
        registry.get_or_register_tagged_as(name, tags, || Self::fixed(start, end, width))
    }

    /// Returns the histogram registered under `name`, building an exclusive
    /// one over `weights` only if absent.
    pub fn get_or_register_weighted(
        registry: &Registry,
        name: &str,
        weights: &[T],
        labels: &[&str],
    ) -> Result<Arc<Self>, RegistryError> {
        registry.get_or_register_as(name, || Self::weighted(weights, labels))
    }

    /// Tagged form of [`BucketHistogram::get_or_register_weighted`].
    pub fn get_or_register_weighted_tagged(
        registry: &Registry,
        name: &str,
        tags: &Tags,
        weights: &[T],
        labels: &[&str],
    ) -> Result<Arc<Self>, RegistryError> {
        registry.get_or_register_tagged_as(name, tags, || Self::weighted(weights, labels))
    }
}

impl<T: Boundary> HistogramMetric for BucketHistogram<T> {
    fn values(&self) -> Vec<u64> {
        BucketHistogram::values(self)
    }

    fn clear(&self) -> Vec<u64> {
        BucketHistogram::clear(self)
    }

    fn labels(&self) -> Vec<String> {
        BucketHistogram::labels(self)
    }

    fn name_total(&self) -> String {
        BucketHistogram::name_total(self)
    }

    fn weights_aliases(&self) -> Vec<String> {
        BucketHistogram::weights_aliases(self)
    }

    fn is_summed(&self) -> bool {
        self.summed
    }

    fn len(&self) -> usize {
        self.boundaries.len()
    }
}

impl<T: Boundary> Histogram<T> for BucketHistogram<T> {
    fn add(&self, value: T) {
        BucketHistogram::add(self, value)
    }

    fn weights(&self) -> Vec<T> {
        self.boundaries.weights.to_vec()
    }

    fn snapshot(&self) -> HistogramSnapshot<T> {
        BucketHistogram::snapshot(self)
    }
}

impl<T: Boundary> Metric for BucketHistogram<T> {
    fn as_histogram(&self) -> Option<&dyn HistogramMetric> {
        Some(self)
    }
}
