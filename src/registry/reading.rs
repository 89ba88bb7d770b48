//! Point-in-time readings of every registered metric.

use std::collections::BTreeMap;
use std::convert::Infallible;

use serde::Serialize;

use super::store::Registry;
use crate::metric::{GaugeValue, Metric};

/// One histogram bucket as seen by a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketReading {
    /// Display label of the bucket.
    pub label: String,
    /// Boundary alias, `"inf"` for the overflow bucket.
    pub le: String,
    /// Observations counted in the bucket.
    pub count: u64,
}

/// Rendered value of a single metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reading {
    /// Counter value.
    Counter {
        /// Current count.
        count: i64,
    },
    /// Gauge value in its native domain.
    Gauge {
        /// Current value.
        value: GaugeValue,
    },
    /// Histogram bucket counts.
    Histogram {
        /// Cumulative bucket semantics.
        summed: bool,
        /// Label naming the aggregate.
        total: String,
        /// Buckets in ascending boundary order.
        buckets: Vec<BucketReading>,
    },
    /// Healthcheck status after a fresh check.
    Healthcheck {
        /// Whether the check reported healthy.
        up: bool,
    },
    /// Rate pair.
    Rate {
        /// Difference between the last two samples.
        delta: f64,
        /// The same difference scaled to one second.
        per_second: f64,
    },
}

impl Reading {
    /// Reads `metric` through its first recognized capability.
    ///
    /// Healthchecks are re-evaluated before their status is read.
    pub fn of(metric: &dyn Metric) -> Option<Reading> {
        if let Some(counter) = metric.as_counter() {
            return Some(Reading::Counter {
                count: counter.count(),
            });
        }
        if let Some(gauge) = metric.as_gauge() {
            return Some(Reading::Gauge {
                value: gauge.value(),
            });
        }
        if let Some(histogram) = metric.as_histogram() {
            let buckets = histogram
                .labels()
                .into_iter()
                .zip(histogram.weights_aliases())
                .zip(histogram.values())
                .map(|((label, le), count)| BucketReading { label, le, count })
                .collect();
            return Some(Reading::Histogram {
                summed: histogram.is_summed(),
                total: histogram.name_total(),
                buckets,
            });
        }
        if let Some(check) = metric.as_healthcheck() {
            check.check();
            return Some(Reading::Healthcheck { up: check.is_up() });
        }
        metric.as_rate().map(|rate| {
            let (delta, per_second) = rate.values();
            Reading::Rate { delta, per_second }
        })
    }
}

impl Registry {
    /// Reads every metric, keyed by name followed by its canonical tags.
    ///
    /// Walks a copy of the registry, so healthchecks run without the
    /// registry lock held.
    pub fn get_all(&self) -> BTreeMap<String, Reading> {
        let mut all = BTreeMap::new();
        let walked = self.each::<Infallible, _>(
            |name, tags, _, metric| {
                if let Some(reading) = Reading::of(metric.as_ref()) {
                    all.insert(format!("{name}{tags}"), reading);
                }
                Ok(())
            },
            true,
        );
        match walked {
            Ok(()) => all,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::BucketHistogram;
    use crate::registry::tags::tags;
    use crate::scalar::{Counter, GaugeFloat64, Healthcheck};
    use std::sync::Arc;

    #[test]
    fn test_get_all_keys_and_values() {
        let registry = Registry::new();
        let counter = Arc::new(Counter::new());
        counter.add(3);
        registry.register("hits", counter).unwrap();

        let gauge = Arc::new(GaugeFloat64::new());
        gauge.update(1.5);
        registry
            .register_tagged("temp", &tags([("room", "a")]), gauge)
            .unwrap();

        let all = registry.get_all();
        assert_eq!(all["hits"], Reading::Counter { count: 3 });
        assert_eq!(
            all["temp;room=a"],
            Reading::Gauge {
                value: GaugeValue::Float(1.5)
            }
        );
    }

    #[test]
    fn test_histogram_reading_pairs_labels() {
        let registry = Registry::new();
        let histogram = Arc::new(BucketHistogram::<i64>::weighted(&[1, 5], &[]));
        histogram.add(3);
        registry.register("latency", histogram).unwrap();

        let all = registry.get_all();
        let Reading::Histogram {
            summed,
            total,
            buckets,
        } = &all["latency"]
        else {
            panic!("expected histogram reading");
        };
        assert!(!summed);
        assert_eq!(total, ".total");
        let les: Vec<_> = buckets.iter().map(|b| b.le.as_str()).collect();
        assert_eq!(les, vec!["1", "5", "inf"]);
        assert_eq!(buckets[1].count, 1);
        assert_eq!(buckets[1].label, ".5");
    }

    #[test]
    fn test_healthcheck_is_checked_before_reading() {
        let registry = Registry::new();
        let check = Arc::new(Healthcheck::new(|_| true));
        check.unhealthy();
        registry.register("db", check).unwrap();

        assert_eq!(registry.get_all()["db"], Reading::Healthcheck { up: true });
    }
}
