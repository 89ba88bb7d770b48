//! The metric registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::tags::{canonical_tags, Tags};
use crate::metric::{Metric, MetricKind};

static NO_TAGS: Tags = Tags::new();

/// Errors returned by registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The identity is already taken.
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),
    /// The value offers none of the recognized capabilities.
    #[error("invalid metric '{0}': no recognized capability")]
    InvalidMetricType(String),
    /// A typed lookup found a metric of another concrete type.
    #[error("metric '{name}' is registered with a different type")]
    TypeMismatch {
        /// Identity of the metric, tags included.
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TaggedName {
    name: String,
    tags: String,
}

#[derive(Clone)]
struct TaggedEntry {
    tags: Tags,
    metric: Arc<dyn Metric>,
}

#[derive(Default, Clone)]
struct Entries {
    metrics: HashMap<String, Arc<dyn Metric>>,
    tagged: HashMap<TaggedName, TaggedEntry>,
}

impl Entries {
    fn visit<E, F>(&self, visitor: &mut F) -> Result<(), E>
    where
        F: FnMut(&str, &str, &Tags, &Arc<dyn Metric>) -> Result<(), E>,
    {
        for (name, metric) in &self.metrics {
            visitor(name, "", &NO_TAGS, metric)?;
        }
        for (key, entry) in &self.tagged {
            visitor(&key.name, &key.tags, &entry.tags, &entry.metric)?;
        }
        Ok(())
    }
}

/// Concurrent store of metrics keyed by name or by (name, tags).
///
/// Untagged and tagged identities live in separate maps, so the same name
/// may appear in both. One reader/writer lock guards membership only; each
/// metric synchronizes its own state.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Entries>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `metric` under `name`.
    ///
    /// Fails without touching the registry if the name is taken or the
    /// value offers no recognized capability.
    pub fn register(&self, name: &str, metric: Arc<dyn Metric>) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        if entries.metrics.contains_key(name) {
            tracing::warn!(name, "Metric already registered");
            return Err(RegistryError::DuplicateMetric(name.to_string()));
        }
        let kind = validate(name, metric.as_ref())?;
        entries.metrics.insert(name.to_string(), metric);
        tracing::debug!(name, ?kind, "Registered metric");
        Ok(())
    }

    /// Registers `metric` under `name` and the given tag set.
    pub fn register_tagged(
        &self,
        name: &str,
        tags: &Tags,
        metric: Arc<dyn Metric>,
    ) -> Result<(), RegistryError> {
        let key = tagged_name(name, tags);
        let mut entries = self.entries.write();
        if entries.tagged.contains_key(&key) {
            tracing::warn!(name, tags = %key.tags, "Tagged metric already registered");
            return Err(RegistryError::DuplicateMetric(identity(&key)));
        }
        let kind = validate(&identity(&key), metric.as_ref())?;
        tracing::debug!(name, tags = %key.tags, ?kind, "Registered tagged metric");
        entries.tagged.insert(
            key,
            TaggedEntry {
                tags: tags.clone(),
                metric,
            },
        );
        Ok(())
    }

    /// Looks up an untagged metric.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.entries.read().metrics.get(name).cloned()
    }

    /// Looks up a tagged metric.
    pub fn get_tagged(&self, name: &str, tags: &Tags) -> Option<Arc<dyn Metric>> {
        let key = tagged_name(name, tags);
        self.entries
            .read()
            .tagged
            .get(&key)
            .map(|entry| Arc::clone(&entry.metric))
    }

    /// Returns the metric registered under `name`, installing `metric` if absent.
    pub fn get_or_register(
        &self,
        name: &str,
        metric: Arc<dyn Metric>,
    ) -> Result<Arc<dyn Metric>, RegistryError> {
        self.get_or_register_with(name, move || metric)
    }

    /// Returns the metric registered under `name`, building it with `factory`
    /// only when absent.
    ///
    /// The factory runs outside the write lock. If another caller installs
    /// the name first, the freshly built instance is dropped and the winner
    /// is returned, so every caller observes the same instance even though
    /// the factory may run more than once under contention.
    pub fn get_or_register_with<F>(
        &self,
        name: &str,
        factory: F,
    ) -> Result<Arc<dyn Metric>, RegistryError>
    where
        F: FnOnce() -> Arc<dyn Metric>,
    {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let metric = factory();
        let kind = validate(name, metric.as_ref())?;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.metrics.get(name) {
            tracing::trace!(name, "Lost registration race, using existing metric");
            return Ok(Arc::clone(existing));
        }
        entries.metrics.insert(name.to_string(), Arc::clone(&metric));
        tracing::debug!(name, ?kind, "Registered metric");
        Ok(metric)
    }

    /// Tagged form of [`Registry::get_or_register`].
    pub fn get_or_register_tagged(
        &self,
        name: &str,
        tags: &Tags,
        metric: Arc<dyn Metric>,
    ) -> Result<Arc<dyn Metric>, RegistryError> {
        self.get_or_register_tagged_with(name, tags, move || metric)
    }

    /// Tagged form of [`Registry::get_or_register_with`].
    pub fn get_or_register_tagged_with<F>(
        &self,
        name: &str,
        tags: &Tags,
        factory: F,
    ) -> Result<Arc<dyn Metric>, RegistryError>
    where
        F: FnOnce() -> Arc<dyn Metric>,
    {
        let key = tagged_name(name, tags);
        if let Some(entry) = self.entries.read().tagged.get(&key) {
            return Ok(Arc::clone(&entry.metric));
        }

        let metric = factory();
        let kind = validate(&identity(&key), metric.as_ref())?;

        let mut entries = self.entries.write();
        if let Some(entry) = entries.tagged.get(&key) {
            tracing::trace!(name, tags = %key.tags, "Lost registration race, using existing metric");
            return Ok(Arc::clone(&entry.metric));
        }
        tracing::debug!(name, tags = %key.tags, ?kind, "Registered tagged metric");
        entries.tagged.insert(
            key,
            TaggedEntry {
                tags: tags.clone(),
                metric: Arc::clone(&metric),
            },
        );
        Ok(metric)
    }

    /// Typed get-or-register: builds a `T` only when `name` is absent and
    /// returns the registered instance as a `T`.
    pub fn get_or_register_as<T, F>(&self, name: &str, factory: F) -> Result<Arc<T>, RegistryError>
    where
        T: Metric,
        F: FnOnce() -> T,
    {
        self.get_or_register_with(name, || Arc::new(factory()))?
            .downcast::<T>()
            .ok_or_else(|| RegistryError::TypeMismatch {
                name: name.to_string(),
            })
    }

    /// Tagged form of [`Registry::get_or_register_as`].
    pub fn get_or_register_tagged_as<T, F>(
        &self,
        name: &str,
        tags: &Tags,
        factory: F,
    ) -> Result<Arc<T>, RegistryError>
    where
        T: Metric,
        F: FnOnce() -> T,
    {
        self.get_or_register_tagged_with(name, tags, || Arc::new(factory()))?
            .downcast::<T>()
            .ok_or_else(|| RegistryError::TypeMismatch {
                name: format!("{name}{}", canonical_tags(tags)),
            })
    }

    /// Checks every registered healthcheck.
    ///
    /// The healthchecks are collected under the read lock and checked after
    /// it is released, so slow checks never hold up writers.
    pub fn run_healthchecks(&self) {
        let checks: Vec<Arc<dyn Metric>> = {
            let entries = self.entries.read();
            entries
                .metrics
                .values()
                .chain(entries.tagged.values().map(|entry| &entry.metric))
                .filter(|metric| metric.as_healthcheck().is_some())
                .cloned()
                .collect()
        };

        tracing::trace!(count = checks.len(), "Running healthchecks");
        for metric in checks {
            if let Some(check) = metric.as_healthcheck() {
                check.check();
            }
        }
    }

    /// Visits every metric, untagged first, then tagged.
    ///
    /// The visitor receives `(name, canonical tags, tag map, handle)`;
    /// untagged metrics get an empty tag string and map. The first error the
    /// visitor returns stops the walk and is returned.
    ///
    /// With `minimize_lock_time` unset the read lock is held for the whole
    /// walk: cheap for small registries, but writers wait until the visitor
    /// finishes, and a visitor that registers or unregisters deadlocks.
    /// With it set both maps are copied under a brief read lock and the copy
    /// is walked unlocked; the walk then reflects the registry at the moment
    /// of the copy and may miss metrics registered or removed while the
    /// visitor runs.
    pub fn each<E, F>(&self, mut visitor: F, minimize_lock_time: bool) -> Result<(), E>
    where
        F: FnMut(&str, &str, &Tags, &Arc<dyn Metric>) -> Result<(), E>,
    {
        if minimize_lock_time {
            let copy = self.entries.read().clone();
            copy.visit(&mut visitor)
        } else {
            self.entries.read().visit(&mut visitor)
        }
    }

    /// Removes an untagged metric, stopping it first if it is stoppable.
    ///
    /// Removing an absent name does nothing.
    pub fn unregister(&self, name: &str) {
        let mut entries = self.entries.write();
        if let Some(metric) = entries.metrics.get(name) {
            stop(metric.as_ref());
            entries.metrics.remove(name);
            tracing::debug!(name, "Unregistered metric");
        }
    }

    /// Removes a tagged metric, stopping it first if it is stoppable.
    pub fn unregister_tagged(&self, name: &str, tags: &Tags) {
        let key = tagged_name(name, tags);
        let mut entries = self.entries.write();
        if let Some(entry) = entries.tagged.get(&key) {
            stop(entry.metric.as_ref());
            entries.tagged.remove(&key);
            tracing::debug!(name, tags = %key.tags, "Unregistered tagged metric");
        }
    }

    /// Stops and removes every metric.
    pub fn unregister_all(&self) {
        let mut entries = self.entries.write();
        let removed = entries.metrics.len() + entries.tagged.len();
        for metric in entries.metrics.values() {
            stop(metric.as_ref());
        }
        for entry in entries.tagged.values() {
            stop(entry.metric.as_ref());
        }
        entries.metrics.clear();
        entries.tagged.clear();
        tracing::info!(removed, "Unregistered all metrics");
    }

    /// Number of registered metrics, tagged and untagged.
    pub fn len(&self) -> usize {
        let entries = self.entries.read();
        entries.metrics.len() + entries.tagged.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("Registry")
            .field("metrics", &entries.metrics.len())
            .field("tagged", &entries.tagged.len())
            .finish()
    }
}

fn tagged_name(name: &str, tags: &Tags) -> TaggedName {
    TaggedName {
        name: name.to_string(),
        tags: canonical_tags(tags),
    }
}

fn identity(key: &TaggedName) -> String {
    format!("{}{}", key.name, key.tags)
}

fn validate(identity: &str, metric: &dyn Metric) -> Result<MetricKind, RegistryError> {
    metric.kind().ok_or_else(|| {
        tracing::warn!(name = identity, "Refusing metric with no recognized capability");
        RegistryError::InvalidMetricType(identity.to_string())
    })
}

fn stop(metric: &dyn Metric) {
    if let Some(stoppable) = metric.as_stoppable() {
        stoppable.stop();
    }
}
