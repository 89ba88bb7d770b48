//! Probe-driven up/down status.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::metric::{HealthcheckMetric, Metric};

type Probe = Box<dyn Fn(bool) -> bool + Send + Sync>;

/// Up/down status refreshed by a probe.
///
/// The probe receives the current status and returns the new one. A fresh
/// healthcheck starts down until its first check.
pub struct Healthcheck {
    up: AtomicBool,
    probe: Probe,
}

impl Healthcheck {
    /// Creates a healthcheck around `probe`.
    pub fn new(probe: impl Fn(bool) -> bool + Send + Sync + 'static) -> Self {
        Self {
            up: AtomicBool::new(false),
            probe: Box::new(probe),
        }
    }

    /// Runs the probe and records its verdict.
    pub fn check(&self) {
        let up = (self.probe)(self.is_up());
        self.up.store(up, Ordering::Relaxed);
    }

    /// Last recorded status.
    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }

    /// Marks the check up.
    pub fn healthy(&self) {
        self.up.store(true, Ordering::Relaxed);
    }

    /// Marks the check down.
    pub fn unhealthy(&self) {
        self.up.store(false, Ordering::Relaxed);
    }
}

registry_constructors!(Healthcheck, probe: impl Fn(bool) -> bool + Send + Sync + 'static);

impl std::fmt::Debug for Healthcheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Healthcheck")
            .field("up", &self.is_up())
            .finish_non_exhaustive()
    }
}

impl HealthcheckMetric for Healthcheck {
    fn check(&self) {
        Healthcheck::check(self)
    }

    fn is_up(&self) -> bool {
        Healthcheck::is_up(self)
    }

    fn healthy(&self) {
        Healthcheck::healthy(self)
    }

    fn unhealthy(&self) {
        Healthcheck::unhealthy(self)
    }
}

impl Metric for Healthcheck {
    fn as_healthcheck(&self) -> Option<&dyn HealthcheckMetric> {
        Some(self)
    }
}
