//! Numeric domains a histogram can be parameterized over.
//!
//! One generic engine covers signed, unsigned and floating boundaries. The
//! domain supplies ordering, the fixed-width arithmetic and the alias
//! rendering; only the floating domain has to sanitize its aliases for use
//! inside dotted metric names.

use std::fmt::Debug;

/// A boundary value type.
pub trait Boundary: Copy + PartialOrd + Debug + Send + Sync + 'static {
    /// Largest representable value, used as the fixed-width overflow boundary.
    const MAX: Self;

    /// Canonical decimal alias of a finite boundary.
    fn alias(self) -> String;

    /// Alias distinguishing `self` from every other value of the domain,
    /// used when two neighbouring boundaries share an [`alias`](Self::alias).
    fn exact_alias(self) -> String {
        self.alias()
    }

    /// Smallest boundary placed above `self` when synthesizing an overflow
    /// boundary. Saturates at the top of the domain.
    fn successor(self) -> Self;

    /// False for values that cannot be ordered (NaN).
    fn is_valid(self) -> bool {
        true
    }

    /// Orders `start`/`end` ascending and makes `width` positive.
    ///
    /// # Panics
    ///
    /// Panics on a zero or unordered width, or unordered endpoints.
    fn normalize_range(start: Self, end: Self, width: Self) -> (Self, Self, Self);

    /// Number of buckets for a normalized range: one per boundary from
    /// `start` up to the first boundary covering `end`, plus the overflow.
    ///
    /// # Panics
    ///
    /// Panics when the count does not fit in `usize`.
    fn bucket_count(start: Self, end: Self, width: Self) -> usize;

    /// The `n`th boundary of a fixed layout, saturating at the top.
    fn nth(start: Self, width: Self, n: usize) -> Self;

    /// O(1) bucket index of `value` in a fixed layout whose last index is
    /// `last`: values at or below `start` land in bucket 0, otherwise
    /// `ceil((value - start) / width)` clamped to `last`.
    fn fixed_index(value: Self, start: Self, width: Self, last: usize) -> usize;
}

macro_rules! integer_boundary {
    ($t:ty, $abs:expr) => {
        impl Boundary for $t {
            const MAX: Self = <$t>::MAX;

            fn alias(self) -> String {
                self.to_string()
            }

            fn successor(self) -> Self {
                self.saturating_add(1)
            }

            fn normalize_range(start: Self, end: Self, width: Self) -> (Self, Self, Self) {
                let width: $t = ($abs)(width);
                assert!(width != 0, "histogram width must be non-zero");
                if end < start {
                    (end, start, width)
                } else {
                    (start, end, width)
                }
            }

            fn bucket_count(start: Self, end: Self, width: Self) -> usize {
                let span = end as i128 - start as i128;
                let width = width as i128;
                let mut n = span / width;
                if span % width != 0 {
                    n += 1;
                }
                match usize::try_from(n).ok().and_then(|n| n.checked_add(2)) {
                    Some(count) => count,
                    None => panic!("histogram range {start}..{end} by {width} has too many buckets"),
                }
            }

            fn nth(start: Self, width: Self, n: usize) -> Self {
                let v = start as i128 + n as i128 * width as i128;
                <$t>::try_from(v).unwrap_or(<$t>::MAX)
            }

            fn fixed_index(value: Self, start: Self, width: Self, last: usize) -> usize {
                if value <= start {
                    return 0;
                }
                let delta = value as i128 - start as i128;
                let width = width as i128;
                let mut n = delta / width;
                if delta % width != 0 {
                    n += 1;
                }
                usize::try_from(n).map_or(last, |n| n.min(last))
            }
        }
    };
}

integer_boundary!(i64, |w: i64| w.saturating_abs());
integer_boundary!(u64, |w: u64| w);

impl Boundary for f64 {
    const MAX: Self = f64::MAX;

    /// Decimal form with at most nine fractional digits, trailing zeros and
    /// a dangling point dropped, and `.` replaced by `_`.
    fn alias(self) -> String {
        sanitize(format!("{self:.9}"))
    }

    /// Shortest decimal form that reads back as `self`, sanitized the same
    /// way.
    fn exact_alias(self) -> String {
        sanitize(self.to_string())
    }

    fn successor(self) -> Self {
        self + 1.0
    }

    fn is_valid(self) -> bool {
        !self.is_nan()
    }

    fn normalize_range(start: Self, end: Self, width: Self) -> (Self, Self, Self) {
        assert!(
            start.is_finite() && end.is_finite(),
            "histogram range must be finite, got {start}..{end}"
        );
        let width = width.abs();
        assert!(
            width.is_finite() && width > 0.0,
            "histogram width must be finite and non-zero, got {width}"
        );
        if end < start {
            (end, start, width)
        } else {
            (start, end, width)
        }
    }

    fn bucket_count(start: Self, end: Self, width: Self) -> usize {
        let n = ((end - start) / width).ceil();
        assert!(
            n.is_finite() && n < (usize::MAX - 2) as f64,
            "histogram range {start}..{end} by {width} has too many buckets"
        );
        n as usize + 2
    }

    fn nth(start: Self, width: Self, n: usize) -> Self {
        start + n as f64 * width
    }

    fn fixed_index(value: Self, start: Self, width: Self, last: usize) -> usize {
        // NaN fails the comparison and joins the first bucket.
        if !(value > start) {
            return 0;
        }
        let estimate = ((value - start) / width).ceil();
        let mut n = if estimate >= last as f64 {
            last
        } else {
            estimate as usize
        };
        // The quotient can round across a boundary; settle against the
        // boundaries themselves.
        while n > 0 && value <= Self::nth(start, width, n - 1) {
            n -= 1;
        }
        while n < last && value > Self::nth(start, width, n) {
            n += 1;
        }
        n
    }
}

fn sanitize(mut text: String) -> String {
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_alias_sanitized() {
        assert_eq!(10.5_f64.alias(), "10_5");
        assert_eq!((0.1_f64 + 0.2).alias(), "0_3");
        assert_eq!(20.0_f64.alias(), "20");
        assert_eq!(0.25_f64.alias(), "0_25");
        assert_eq!((-1.5_f64).alias(), "-1_5");
        assert_eq!((-0.0_f64).alias(), "0");
    }

    #[test]
    fn test_float_exact_alias() {
        assert_eq!(1e-10_f64.alias(), "0");
        assert_eq!(1e-10_f64.exact_alias(), "0_0000000001");
        assert_eq!(2e-10_f64.exact_alias(), "0_0000000002");
        assert_eq!(10.5_f64.exact_alias(), "10_5");
        assert_eq!((-0.0_f64).exact_alias(), "0");
    }

    #[test]
    fn test_integer_alias() {
        assert_eq!((-10_i64).alias(), "-10");
        assert_eq!(u64::MAX.alias(), "18446744073709551615");
    }

    #[test]
    fn test_bucket_count_rounds_up() {
        assert_eq!(i64::bucket_count(10, 50, 10), 6);
        assert_eq!(i64::bucket_count(10, 45, 10), 6);
        assert_eq!(u64::bucket_count(100, 1000, 100), 11);
        assert_eq!(f64::bucket_count(0.0, 1.0, 0.25), 6);
    }

    #[test]
    #[should_panic(expected = "too many buckets")]
    fn test_float_bucket_count_overflow_panics() {
        f64::bucket_count(-1e308, 1e308, 1.0);
    }

    #[test]
    #[should_panic(expected = "too many buckets")]
    fn test_integer_bucket_count_overflow_panics() {
        u64::bucket_count(0, u64::MAX, 1);
    }

    #[test]
    fn test_normalize_swaps_and_abs() {
        assert_eq!(i64::normalize_range(50, 10, -10), (10, 50, 10));
        assert_eq!(f64::normalize_range(1.0, 0.0, -0.5), (0.0, 1.0, 0.5));
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_width_panics() {
        u64::normalize_range(0, 10, 0);
    }

    #[test]
    fn test_fixed_index() {
        let idx = |v| i64::fixed_index(v, 10, 10, 5);
        assert_eq!(idx(i64::MIN), 0);
        assert_eq!(idx(10), 0);
        assert_eq!(idx(11), 1);
        assert_eq!(idx(20), 1);
        assert_eq!(idx(49), 4);
        assert_eq!(idx(51), 5);
        assert_eq!(idx(i64::MAX), 5);
        assert_eq!(u64::fixed_index(u64::MAX, 0, 1, 3), 3);
        assert_eq!(f64::fixed_index(f64::NAN, 0.0, 1.0, 3), 0);
        assert_eq!(f64::fixed_index(f64::INFINITY, 0.0, 1.0, 3), 3);
    }

    #[test]
    fn test_float_index_matches_generated_boundaries() {
        let last = f64::bucket_count(0.0, 1.0, 0.1) - 1;
        for n in 0..last {
            let boundary = f64::nth(0.0, 0.1, n);
            assert_eq!(f64::fixed_index(boundary, 0.0, 0.1, last), n, "boundary {boundary}");
        }
        assert_eq!(f64::fixed_index(0.3, 0.0, 0.1, last), 3);
        assert_eq!(f64::fixed_index(0.31, 0.0, 0.1, last), 4);
    }

    #[test]
    fn test_successor_saturates() {
        assert_eq!(i64::MAX.successor(), i64::MAX);
        assert_eq!(7_u64.successor(), 8);
        assert_eq!(2.5_f64.successor(), 3.5);
    }

    #[test]
    fn test_nth_saturates() {
        assert_eq!(i64::nth(i64::MAX - 5, 10, 1), i64::MAX);
        assert_eq!(u64::nth(10, 10, 3), 40);
    }
}
