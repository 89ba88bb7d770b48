use std::sync::OnceLock;

use super::store::Registry;

static DEFAULT: OnceLock<Registry> = OnceLock::new();

/// Process-wide registry for applications that do not thread their own.
///
/// Created on first use. Nothing inside this crate reaches for it.
pub fn default_registry() -> &'static Registry {
    DEFAULT.get_or_init(|| {
        tracing::debug!("Initialized default registry");
        Registry::new()
    })
}
