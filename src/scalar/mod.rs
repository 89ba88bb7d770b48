//! Scalar metrics
//!
//! Single-value metrics that sit in the registry next to histograms:
//! counters, gauges, rates, healthchecks and meters. Each owns its own
//! synchronization and offers a read-only snapshot.

/// Adds `new_registered` and `get_or_register` constructors, plus their
/// tagged forms, forwarding any extra arguments to `new`.
macro_rules! registry_constructors {
    ($t:ty $(, $arg:ident: $argty:ty)*) => {
        impl $t {
            /// Builds a new instance and registers it under `name`.
            pub fn new_registered(
                registry: &$crate::registry::Registry,
                name: &str,
                $($arg: $argty,)*
            ) -> Result<std::sync::Arc<Self>, $crate::registry::RegistryError> {
                let metric = std::sync::Arc::new(Self::new($($arg),*));
                registry.register(name, metric.clone())?;
                Ok(metric)
            }

            /// Builds a new instance and registers it under `name` and `tags`.
            pub fn new_registered_tagged(
                registry: &$crate::registry::Registry,
                name: &str,
                tags: &$crate::registry::Tags,
                $($arg: $argty,)*
            ) -> Result<std::sync::Arc<Self>, $crate::registry::RegistryError> {
                let metric = std::sync::Arc::new(Self::new($($arg),*));
                registry.register_tagged(name, tags, metric.clone())?;
                Ok(metric)
            }

            /// Returns the instance registered under `name`, building one
            /// only if absent.
            pub fn get_or_register(
                registry: &$crate::registry::Registry,
                name: &str,
                $($arg: $argty,)*
            ) -> Result<std::sync::Arc<Self>, $crate::registry::RegistryError> {
                registry.get_or_register_as(name, move || Self::new($($arg),*))
            }

            /// Tagged form of `get_or_register`.
            pub fn get_or_register_tagged(
                registry: &$crate::registry::Registry,
                name: &str,
                tags: &$crate::registry::Tags,
                $($arg: $argty,)*
            ) -> Result<std::sync::Arc<Self>, $crate::registry::RegistryError> {
                registry.get_or_register_tagged_as(name, tags, move || Self::new($($arg),*))
            }
        }
    };
}

mod counter;
mod gauge;
mod healthcheck;
mod meter;
mod rate;

pub use counter::{Counter, CounterSnapshot, DownCounter};
pub use gauge::{
    Differ, FunctionalGauge, FunctionalGaugeFloat64, FunctionalUGauge, Gauge, GaugeFloat64,
    GaugeFloat64Snapshot, GaugeSnapshot, UGauge, UGaugeSnapshot,
};
pub use healthcheck::Healthcheck;
pub use meter::{Meter, MeterSnapshot};
pub use rate::{Rate, RateSnapshot};
