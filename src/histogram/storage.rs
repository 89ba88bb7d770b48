//! Boundary sets and label state shared by live histograms and snapshots.

use std::cmp::Ordering;
use std::sync::Arc;

use super::domain::Boundary;

/// Alias of the synthetic overflow boundary.
pub const INF_ALIAS: &str = "inf";

/// Joiner placed before every derived label.
const LABEL_JOINER: &str = ".";

/// Default label naming the aggregate.
pub const DEFAULT_TOTAL: &str = ".total";

/// Immutable ascending boundaries with their aliases.
#[derive(Debug, Clone)]
pub(crate) struct Boundaries<T> {
    pub(crate) weights: Arc<[T]>,
    pub(crate) aliases: Arc<[String]>,
}

impl<T: Boundary> Boundaries<T> {
    /// `start, start + width, ...` up to the first boundary covering `end`,
    /// followed by the domain maximum as overflow.
    pub(crate) fn fixed(start: T, end: T, width: T) -> Self {
        let count = T::bucket_count(start, end, width);
        let mut weights: Vec<T> = (0..count - 1).map(|n| T::nth(start, width, n)).collect();
        weights.push(T::MAX);
        Self::with_overflow(weights)
    }

    /// Sorted copy of `supplied` followed by a synthetic boundary above its
    /// maximum.
    ///
    /// # Panics
    ///
    /// Panics on an empty set, an unordered value (NaN) or a duplicate.
    pub(crate) fn explicit(supplied: &[T]) -> Self {
        assert!(
            !supplied.is_empty(),
            "histogram needs at least one boundary"
        );
        if let Some(bad) = supplied.iter().find(|w| !w.is_valid()) {
            panic!("histogram boundary {bad:?} cannot be ordered");
        }

        let mut weights = supplied.to_vec();
        weights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        if let Some(pair) = weights.windows(2).find(|pair| pair[0] >= pair[1]) {
            panic!("histogram boundary {:?} is duplicated", pair[1]);
        }

        let overflow = weights[weights.len() - 1].successor();
        weights.push(overflow);
        Self::with_overflow(weights)
    }

    /// Aliases every boundary but the last, which becomes [`INF_ALIAS`].
    ///
    /// Ascending boundaries sharing a rounded alias sit next to each other;
    /// those fall back to their exact alias so labels stay distinct.
    fn with_overflow(weights: Vec<T>) -> Self {
        let last = weights.len() - 1;
        let rounded: Vec<String> = weights[..last].iter().map(|w| w.alias()).collect();
        let mut aliases: Vec<String> = rounded
            .iter()
            .enumerate()
            .map(|(i, alias)| {
                let clashes = (i > 0 && rounded[i - 1] == *alias)
                    || rounded.get(i + 1).is_some_and(|next| next == alias);
                if clashes {
                    weights[i].exact_alias()
                } else {
                    alias.clone()
                }
            })
            .collect();
        aliases.push(INF_ALIAS.to_string());
        Self {
            weights: weights.into(),
            aliases: aliases.into(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.weights.len()
    }

    /// Index of the first boundary at or above `value`, clamped to the
    /// overflow bucket.
    pub(crate) fn lower_bound(&self, value: T) -> usize {
        self.weights
            .partition_point(|w| *w < value)
            .min(self.len() - 1)
    }
}

/// Display labels of a histogram.
///
/// Labels not explicitly overridden are derived as joiner + prefix + alias,
/// so changing the prefix re-derives them while overrides stay verbatim.
#[derive(Debug, Clone)]
pub(crate) struct LabelSet {
    prefix: String,
    overrides: Vec<String>,
    total: String,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            overrides: Vec::new(),
            total: DEFAULT_TOTAL.to_string(),
        }
    }
}

impl LabelSet {
    pub(crate) fn with_overrides(labels: &[&str]) -> Self {
        let mut set = Self::default();
        set.set_overrides(labels);
        set
    }

    pub(crate) fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    /// Overrides the first `labels.len()` labels; an empty entry keeps the
    /// derived label at that position.
    pub(crate) fn set_overrides(&mut self, labels: &[&str]) {
        self.overrides = labels.iter().map(|l| l.to_string()).collect();
    }

    pub(crate) fn set_total(&mut self, total: &str) {
        self.total = total.to_string();
    }

    pub(crate) fn total(&self) -> &str {
        &self.total
    }

    pub(crate) fn render(&self, aliases: &[String]) -> Vec<String> {
        aliases
            .iter()
            .enumerate()
            .map(|(i, alias)| match self.overrides.get(i) {
                Some(label) if !label.is_empty() => label.clone(),
                _ => format!("{LABEL_JOINER}{}{alias}", self.prefix),
            })
            .collect()
    }
}
