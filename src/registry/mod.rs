//! Metric registry
//!
//! Holds every metric under a bare name or a (name, tags) identity and
//! exposes the lookup, lazy registration, iteration and teardown paths
//! reporters build on.

mod global;
mod reading;
mod store;
mod tags;

pub use global::default_registry;
pub use reading::{BucketReading, Reading};
pub use store::{Registry, RegistryError};
pub use tags::{canonical_tags, merge_tags, tags, Tags};
