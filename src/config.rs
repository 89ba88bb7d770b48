//! Declarative metric configuration.
//!
//! Histograms can be declared in a TOML file and installed into a registry
//! at startup. Layouts are checked up front, so a bad file is reported as
//! a [`ConfigError`] instead of tripping a constructor panic.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::histogram::{Boundary, BucketHistogram};
use crate::metric::Metric;
use crate::registry::{Registry, RegistryError, Tags};

/// Largest number of buckets a configured histogram may declare.
pub const MAX_BUCKETS: usize = 1 << 20;

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The document is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    /// A histogram entry describes an unusable layout.
    #[error("invalid histogram '{name}': {reason}")]
    InvalidHistogram {
        /// Name of the offending entry.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Installing a histogram in the registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Declared histograms.
    #[serde(default)]
    pub histograms: Vec<HistogramConfig>,
    /// Demonstration workload.
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        for histogram in &config.histograms {
            histogram.validate()?;
        }
        Ok(config)
    }

    /// Installs every declared histogram, returning the registered handles
    /// in declaration order.
    pub fn register_all(&self, registry: &Registry) -> Result<Vec<Arc<dyn Metric>>, ConfigError> {
        self.histograms
            .iter()
            .map(|histogram| histogram.register(registry))
            .collect()
    }
}

/// Numeric domain of a histogram's boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Signed 64-bit boundaries.
    #[default]
    Int,
    /// Unsigned 64-bit boundaries.
    Uint,
    /// Floating-point boundaries.
    Float,
}

/// A boundary as written in the file.
///
/// Integers are kept exact so integer domains never round through `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundaryValue {
    /// A TOML integer.
    Int(i64),
    /// A TOML float.
    Float(f64),
}

impl BoundaryValue {
    fn to_i64(self) -> Result<i64, String> {
        match self {
            BoundaryValue::Int(v) => Ok(v),
            BoundaryValue::Float(v) => Err(format!("{v} is not an integer")),
        }
    }

    fn to_u64(self) -> Result<u64, String> {
        let v = self.to_i64()?;
        u64::try_from(v).map_err(|_| format!("{v} is out of the unsigned range"))
    }

    fn to_f64(self) -> Result<f64, String> {
        let v = self.approx();
        if v.is_finite() {
            Ok(v)
        } else {
            Err(format!("{v} is not a finite number"))
        }
    }

    fn approx(self) -> f64 {
        match self {
            BoundaryValue::Int(v) => v as f64,
            BoundaryValue::Float(v) => v,
        }
    }
}

/// Boundary layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayoutConfig {
    /// `start` through `end` every `width`.
    Fixed {
        /// First boundary.
        start: BoundaryValue,
        /// Last finite boundary.
        end: BoundaryValue,
        /// Distance between boundaries.
        width: BoundaryValue,
    },
    /// Explicit boundaries, in any order.
    Weighted {
        /// Boundaries; an overflow boundary is appended.
        weights: Vec<BoundaryValue>,
    },
}

/// A layout converted into one domain.
enum Bounds<T> {
    Fixed { start: T, end: T, width: T },
    Weighted(Vec<T>),
}

/// One `[[histograms]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// Metric name.
    pub name: String,
    /// Tags of a tagged identity; empty for a bare name.
    #[serde(default)]
    pub tags: Tags,
    /// Boundary domain.
    #[serde(default)]
    pub domain: Domain,
    /// Cumulative bucket semantics.
    #[serde(default)]
    pub summed: bool,
    /// Boundary layout.
    #[serde(flatten)]
    pub layout: LayoutConfig,
    /// Prefix of derived labels.
    #[serde(default)]
    pub label_prefix: Option<String>,
    /// Explicit labels for the first buckets.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Label naming the aggregate.
    #[serde(default)]
    pub total: Option<String>,
}

impl HistogramConfig {
    /// Checks the layout against the domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.domain {
            Domain::Int => self.bounds(BoundaryValue::to_i64).map(drop),
            Domain::Uint => self.bounds(BoundaryValue::to_u64).map(drop),
            Domain::Float => self.bounds(BoundaryValue::to_f64).map(drop),
        }
    }

    /// Converts the layout into the domain's boundary type and checks it.
    fn bounds<T: Boundary>(
        &self,
        convert: impl Fn(BoundaryValue) -> Result<T, String>,
    ) -> Result<Bounds<T>, ConfigError> {
        if self.name.is_empty() {
            return Err(self.invalid("name must not be empty"));
        }
        let convert = |value| convert(value).map_err(|reason| self.invalid(&reason));
        match &self.layout {
            LayoutConfig::Fixed { start, end, width } => {
                let bounds = Bounds::Fixed {
                    start: convert(*start)?,
                    end: convert(*end)?,
                    width: convert(*width)?,
                };
                if width.approx() == 0.0 {
                    return Err(self.invalid("width must be non-zero"));
                }
                let buckets = ((end.approx() - start.approx()) / width.approx()).abs();
                if !buckets.is_finite() || buckets >= MAX_BUCKETS as f64 {
                    return Err(self.invalid(&format!(
                        "range declares more than {MAX_BUCKETS} buckets"
                    )));
                }
                Ok(bounds)
            }
            LayoutConfig::Weighted { weights } => {
                if weights.is_empty() {
                    return Err(self.invalid("weights must not be empty"));
                }
                if weights.len() >= MAX_BUCKETS {
                    return Err(self.invalid(&format!("more than {MAX_BUCKETS} weights")));
                }
                let mut sorted = weights
                    .iter()
                    .map(|w| convert(*w))
                    .collect::<Result<Vec<T>, _>>()?;
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
                    return Err(self.invalid(&format!("duplicate weight {}", pair[0].alias())));
                }
                Ok(Bounds::Weighted(sorted))
            }
        }
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::InvalidHistogram {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Validates the entry, then returns the histogram registered under its
    /// identity, building one in the declared domain only if absent.
    pub fn register(&self, registry: &Registry) -> Result<Arc<dyn Metric>, ConfigError> {
        let metric = match self.domain {
            Domain::Int => self.install(registry, self.bounds(BoundaryValue::to_i64)?)?,
            Domain::Uint => self.install(registry, self.bounds(BoundaryValue::to_u64)?)?,
            Domain::Float => self.install(registry, self.bounds(BoundaryValue::to_f64)?)?,
        };
        tracing::debug!(name = %self.name, domain = ?self.domain, summed = self.summed, "Configured histogram");
        Ok(metric)
    }

    fn install<T: Boundary>(
        &self,
        registry: &Registry,
        bounds: Bounds<T>,
    ) -> Result<Arc<dyn Metric>, RegistryError> {
        let factory = || -> Arc<dyn Metric> { Arc::new(self.build(&bounds)) };
        if self.tags.is_empty() {
            registry.get_or_register_with(&self.name, factory)
        } else {
            registry.get_or_register_tagged_with(&self.name, &self.tags, factory)
        }
    }

    fn build<T: Boundary>(&self, bounds: &Bounds<T>) -> BucketHistogram<T> {
        let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        let histogram = match bounds {
            Bounds::Fixed { start, end, width } => {
                let histogram = if self.summed {
                    BucketHistogram::fixed_summed(*start, *end, *width)
                } else {
                    BucketHistogram::fixed(*start, *end, *width)
                };
                histogram.set_labels(&labels);
                histogram
            }
            Bounds::Weighted(weights) => {
                if self.summed {
                    BucketHistogram::weighted_summed(weights, &labels)
                } else {
                    BucketHistogram::weighted(weights, &labels)
                }
            }
        };
        if let Some(prefix) = &self.label_prefix {
            histogram.set_label_prefix(prefix);
        }
        if let Some(total) = &self.total {
            histogram.set_name_total(total);
        }
        histogram
    }
}

/// Settings for the demonstration workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Observations per histogram when not continuous.
    pub iterations: u64,
    /// Seed of the synthetic observation stream.
    pub seed: u64,
    /// Run until interrupted.
    pub continuous: bool,
    /// Milliseconds between reports in continuous mode.
    pub interval_ms: u64,
    /// Walk a copy of the registry when reporting.
    pub minimize_lock: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            seed: 42,
            continuous: false,
            interval_ms: 1000, // 1s
            minimize_lock: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::HistogramSnapshot;
    use crate::registry::tags;

    const SAMPLE: &str = r#"
[[histograms]]
name = "latency"
domain = "int"
kind = "fixed"
start = 10
end = 50
width = 10
label_prefix = "le_"

[[histograms]]
name = "size"
domain = "uint"
summed = true
kind = "weighted"
weights = [8, 1, 20, 5, 2]
labels = ["tiny"]
total = "size_total"
tags = { host = "web1" }

[[histograms]]
name = "ratio"
domain = "float"
kind = "weighted"
weights = [0.5, 0.25]

[workload]
iterations = 10
"#;

    #[test]
    fn test_parse_sample() {
        let config = FileConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.histograms.len(), 3);
        assert_eq!(config.workload.iterations, 10);
        assert_eq!(config.workload.seed, 42);
        assert_eq!(
            config.histograms[0].layout,
            LayoutConfig::Fixed {
                start: BoundaryValue::Int(10),
                end: BoundaryValue::Int(50),
                width: BoundaryValue::Int(10),
            }
        );
        assert_eq!(config.histograms[1].tags, tags([("host", "web1")]));
    }

    #[test]
    fn test_register_all_builds_domains() {
        let config = FileConfig::from_toml(SAMPLE).unwrap();
        let registry = Registry::new();
        config.register_all(&registry).unwrap();

        let latency = registry
            .get("latency")
            .and_then(|m| m.downcast::<BucketHistogram<i64>>())
            .unwrap();
        assert_eq!(latency.labels()[0], ".le_10");
        assert_eq!(latency.len(), 6);

        let size = registry
            .get_tagged("size", &tags([("host", "web1")]))
            .and_then(|m| m.downcast::<BucketHistogram<u64>>())
            .unwrap();
        assert!(size.is_summed());
        assert_eq!(size.weights(), &[1, 2, 5, 8, 20, 21]);
        assert_eq!(size.labels()[0], "tiny");
        assert_eq!(size.name_total(), "size_total");

        let ratio = registry
            .get("ratio")
            .and_then(|m| m.downcast::<BucketHistogram<f64>>())
            .unwrap();
        let snap: HistogramSnapshot<f64> = ratio.snapshot();
        assert_eq!(snap.weights_aliases(), vec!["0_25", "0_5", "inf"]);
    }

    #[test]
    fn test_register_keeps_existing() {
        let config = FileConfig::from_toml(SAMPLE).unwrap();
        let registry = Registry::new();
        let first = config.histograms[0].register(&registry).unwrap();
        let second = config.histograms[0].register(&registry).unwrap();
        assert!(<dyn Metric>::same_instance(&first, &second));
    }

    fn invalid(toml: &str) -> String {
        match FileConfig::from_toml(toml) {
            Err(ConfigError::InvalidHistogram { reason, .. }) => reason,
            other => panic!("expected invalid histogram, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_layouts() {
        let zero_width = "[[histograms]]\nname = \"h\"\nkind = \"fixed\"\nstart = 0\nend = 10\nwidth = 0\n";
        assert!(invalid(zero_width).contains("non-zero"));

        let duplicate = "[[histograms]]\nname = \"h\"\nkind = \"weighted\"\nweights = [1, 2, 1]\n";
        assert!(invalid(duplicate).contains("duplicate"));

        let fractional = "[[histograms]]\nname = \"h\"\nkind = \"weighted\"\nweights = [1.5]\n";
        assert!(invalid(fractional).contains("not an integer"));

        let negative = "[[histograms]]\nname = \"h\"\ndomain = \"uint\"\nkind = \"weighted\"\nweights = [-1]\n";
        assert!(invalid(negative).contains("unsigned range"));

        let empty = "[[histograms]]\nname = \"h\"\nkind = \"weighted\"\nweights = []\n";
        assert!(invalid(empty).contains("empty"));
    }

    #[test]
    fn test_rejects_oversized_ranges() {
        let float_span = "[[histograms]]\nname = \"h\"\ndomain = \"float\"\nkind = \"fixed\"\nstart = -1e308\nend = 1e308\nwidth = 1.0\n";
        assert!(invalid(float_span).contains("buckets"));

        let int_span = "[[histograms]]\nname = \"h\"\nkind = \"fixed\"\nstart = -9223372036854775808\nend = 9223372036854775807\nwidth = 1\n";
        assert!(invalid(int_span).contains("buckets"));

        let registry = Registry::new();
        let config: FileConfig = toml::from_str(float_span).unwrap();
        assert!(matches!(
            config.histograms[0].register(&registry),
            Err(ConfigError::InvalidHistogram { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_large_integer_weights_stay_exact() {
        let toml = "[[histograms]]\nname = \"h\"\nkind = \"weighted\"\nweights = [9007199254740993, 9007199254740992]\n";
        let config = FileConfig::from_toml(toml).unwrap();
        let registry = Registry::new();
        config.register_all(&registry).unwrap();
        let h = registry
            .get("h")
            .and_then(|m| m.downcast::<BucketHistogram<i64>>())
            .unwrap();
        assert_eq!(
            h.weights(),
            &[9007199254740992, 9007199254740993, 9007199254740994]
        );
        h.add(9007199254740993);
        assert_eq!(h.values(), vec![0, 1, 0]);
    }

    #[test]
    fn test_integer_domain_rejects_floats() {
        let toml = "[[histograms]]\nname = \"h\"\ndomain = \"uint\"\nkind = \"fixed\"\nstart = 0\nend = 10.0\nwidth = 1\n";
        assert!(invalid(toml).contains("not an integer"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            FileConfig::from_toml("[[histograms]]\nname = 3\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileConfig::from_file("/nonexistent/metrics.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert!(config.histograms.is_empty());
        assert!(config.workload.minimize_lock);
    }
}
