//! Meters: event counts with exponentially weighted moving rates.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::metric::{CounterMetric, Metric, Stoppable};

/// Interval between moving-average ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct Ewma {
    alpha: f64,
    rate: f64,
    primed: bool,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        let tick = TICK_INTERVAL.as_secs_f64();
        Self {
            alpha: 1.0 - (-tick / 60.0 / minutes).exp(),
            rate: 0.0,
            primed: false,
        }
    }

    fn tick(&mut self, instant_rate: f64) {
        if self.primed {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.primed = true;
        }
    }
}

#[derive(Debug)]
struct MeterState {
    count: AtomicI64,
    uncounted: AtomicI64,
    averages: Mutex<[Ewma; 3]>,
    started: Instant,
}

impl MeterState {
    fn tick(&self) {
        let events = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = events as f64 / TICK_INTERVAL.as_secs_f64();
        for ewma in self.averages.lock().iter_mut() {
            ewma.tick(instant_rate);
        }
    }
}

struct Ticker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Counts events and tracks their 1, 5 and 15 minute moving rates plus the
/// mean rate since creation.
///
/// A background thread ticks the moving averages every [`TICK_INTERVAL`].
/// [`Meter::stop`] halts and joins it; dropping the meter does the same.
pub struct Meter {
    state: Arc<MeterState>,
    ticker: Mutex<Option<Ticker>>,
}

impl Meter {
    /// Creates a meter and starts its ticker.
    pub fn new() -> Self {
        let state = Arc::new(MeterState {
            count: AtomicI64::new(0),
            uncounted: AtomicI64::new(0),
            averages: Mutex::new([
                Ewma::over_minutes(1.0),
                Ewma::over_minutes(5.0),
                Ewma::over_minutes(15.0),
            ]),
            started: Instant::now(),
        });
        let ticker = spawn_ticker(Arc::clone(&state));
        Self {
            state,
            ticker: Mutex::new(ticker),
        }
    }

    /// Records `n` events.
    pub fn mark(&self, n: i64) {
        self.state.count.fetch_add(n, Ordering::Relaxed);
        self.state.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Total events marked.
    pub fn count(&self) -> i64 {
        self.state.count.load(Ordering::Relaxed)
    }

    /// One-minute moving rate, events per second.
    pub fn rate1(&self) -> f64 {
        self.state.averages.lock()[0].rate
    }

    /// Five-minute moving rate.
    pub fn rate5(&self) -> f64 {
        self.state.averages.lock()[1].rate
    }

    /// Fifteen-minute moving rate.
    pub fn rate15(&self) -> f64 {
        self.state.averages.lock()[2].rate
    }

    /// Events per second since creation.
    pub fn rate_mean(&self) -> f64 {
        let elapsed = self.state.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.count() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Read-only copy of the count and rates.
    pub fn snapshot(&self) -> MeterSnapshot {
        let [one, five, fifteen] = *self.state.averages.lock();
        MeterSnapshot {
            count: self.count(),
            rate1: one.rate,
            rate5: five.rate,
            rate15: fifteen.rate,
            rate_mean: self.rate_mean(),
        }
    }

    /// Halts the background ticker. Later calls do nothing.
    pub fn stop(&self) {
        let Some(ticker) = self.ticker.lock().take() else {
            return;
        };
        drop(ticker.stop);
        if ticker.handle.join().is_err() {
            tracing::warn!("Meter ticker panicked");
        }
        tracing::debug!(count = self.count(), "Meter stopped");
    }

    fn is_ticking(&self) -> bool {
        self.ticker.lock().is_some()
    }
}

fn spawn_ticker(state: Arc<MeterState>) -> Option<Ticker> {
    let (stop, stopped) = mpsc::channel::<()>();
    let spawned = thread::Builder::new()
        .name("meter-tick".to_string())
        .spawn(move || loop {
            match stopped.recv_timeout(TICK_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => state.tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

    match spawned {
        Ok(handle) => Some(Ticker { stop, handle }),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to start meter ticker, moving rates stay at zero");
            None
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Meter {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("count", &self.count())
            .field("ticking", &self.is_ticking())
            .finish()
    }
}

registry_constructors!(Meter);

impl CounterMetric for Meter {
    fn count(&self) -> i64 {
        Meter::count(self)
    }

    fn add(&self, delta: i64) {
        self.mark(delta)
    }

    fn clear(&self) -> i64 {
        self.state.uncounted.store(0, Ordering::Relaxed);
        self.state.count.swap(0, Ordering::Relaxed)
    }
}

impl Stoppable for Meter {
    fn stop(&self) {
        Meter::stop(self)
    }
}

impl Metric for Meter {
    fn as_counter(&self) -> Option<&dyn CounterMetric> {
        Some(self)
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }
}

/// Read-only meter readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSnapshot {
    /// Total events marked.
    pub count: i64,
    /// One-minute moving rate.
    pub rate1: f64,
    /// Five-minute moving rate.
    pub rate5: f64,
    /// Fifteen-minute moving rate.
    pub rate15: f64,
    /// Mean rate since creation.
    pub rate_mean: f64,
}

impl CounterMetric for MeterSnapshot {
    fn count(&self) -> i64 {
        self.count
    }

    fn add(&self, _delta: i64) {
        panic!("mark called on a meter snapshot");
    }

    fn clear(&self) -> i64 {
        panic!("clear called on a meter snapshot");
    }
}

impl Metric for MeterSnapshot {
    fn as_counter(&self) -> Option<&dyn CounterMetric> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_tick_sets_rates() {
        let m = Meter::new();
        m.mark(47);
        m.state.tick();
        assert!(approx(m.rate1(), 9.4));
        assert!(approx(m.rate5(), 9.4));
        assert!(approx(m.rate15(), 9.4));
    }

    #[test]
    fn test_rates_decay() {
        let m = Meter::new();
        m.mark(60);
        m.state.tick();
        m.state.tick();
        let one = 12.0 * (-5.0_f64 / 60.0).exp();
        assert!(approx(m.rate1(), one));
        assert!(m.rate15() > m.rate1());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let m = Meter::new();
        assert!(m.is_ticking());
        m.stop();
        m.stop();
        assert!(!m.is_ticking());
        m.mark(1);
        assert_eq!(m.count(), 1);
    }

    #[test]
    fn test_snapshot_keeps_count() {
        let m = Meter::new();
        m.mark(3);
        let snap = m.snapshot();
        m.mark(3);
        assert_eq!(snap.count, 3);
        assert_eq!(m.count(), 6);
    }

    #[test]
    fn test_unregister_stops_meter() {
        let registry = Registry::new();
        let m = Meter::new_registered(&registry, "requests").unwrap();
        m.mark(47);
        assert_eq!(Meter::get_or_register(&registry, "requests").unwrap().count(), 47);

        registry.unregister("requests");
        assert!(!m.is_ticking());
    }
}
