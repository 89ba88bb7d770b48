//! Tagged Metrics CLI
//!
//! Demonstrates the registry and histogram engine: installs histograms
//! from a config file (or a built-in set), feeds them a seeded synthetic
//! workload, and logs what a reporter would see when walking the registry.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use tagged_metrics::{
    config::{BoundaryValue, Domain, LayoutConfig},
    tags, BucketHistogram, Counter, FileConfig, Gauge, Healthcheck, HistogramConfig, Meter, Metric,
    Rate, Reading, Registry,
};
use tracing::{info, warn};

/// Command-line options; each one overrides the `[workload]` section.
#[derive(Debug, Parser)]
#[command(name = "tagged-metrics", version, about = "Metrics registry demonstration")]
struct Args {
    /// TOML file declaring histograms and workload settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Observations per histogram per round.
    #[arg(long)]
    iterations: Option<u64>,
    /// Seed of the synthetic observation stream.
    #[arg(long)]
    seed: Option<u64>,
    /// Keep running until Ctrl-C, reporting every interval.
    #[arg(long)]
    continuous: bool,
    /// Milliseconds between reports in continuous mode.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Walk a copy of the registry when reporting (true/false).
    #[arg(long)]
    minimize_lock: Option<bool>,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Tagged Metrics v{}", tagged_metrics::VERSION);

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if config.histograms.is_empty() {
        config.histograms = builtin_histograms();
    }

    let workload = &mut config.workload;
    if let Some(iterations) = args.iterations {
        workload.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        workload.seed = seed;
    }
    if let Some(interval_ms) = args.interval_ms {
        workload.interval_ms = interval_ms;
    }
    if let Some(minimize_lock) = args.minimize_lock {
        workload.minimize_lock = minimize_lock;
    }
    workload.continuous |= args.continuous;
    let workload = config.workload.clone();

    let registry = Registry::new();
    let histograms = match config.register_all(&registry) {
        Ok(histograms) => histograms,
        Err(e) => {
            eprintln!("Failed to register histograms: {}", e);
            std::process::exit(1);
        }
    };
    let scalars = match Scalars::register(&registry) {
        Ok(scalars) => scalars,
        Err(e) => {
            eprintln!("Failed to register metrics: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        metrics = registry.len(),
        seed = workload.seed,
        "Registry ready"
    );

    let mut rng = ChaCha20Rng::seed_from_u64(workload.seed);

    if !workload.continuous {
        run_round(&histograms, &scalars, &mut rng, workload.iterations);
        registry.run_healthchecks();
        report(&registry, workload.minimize_lock, false);
        registry.unregister_all();
        info!("Done");
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    info!(interval_ms = workload.interval_ms, "Running until interrupted");
    let interval = Duration::from_millis(workload.interval_ms);
    let mut rounds = 0u64;
    while running.load(Ordering::SeqCst) {
        run_round(&histograms, &scalars, &mut rng, workload.iterations);
        registry.run_healthchecks();
        report(&registry, workload.minimize_lock, true);
        rounds += 1;
        std::thread::sleep(interval);
    }

    registry.unregister_all();
    info!(rounds, "Stopped");
}

/// Histograms used when no config file declares any.
fn builtin_histograms() -> Vec<HistogramConfig> {
    vec![
        HistogramConfig {
            name: "request.latency_ms".to_string(),
            tags: tags([("service", "demo")]),
            domain: Domain::Int,
            summed: false,
            layout: LayoutConfig::Fixed {
                start: BoundaryValue::Int(50),
                end: BoundaryValue::Int(500),
                width: BoundaryValue::Int(50),
            },
            label_prefix: Some("le_".to_string()),
            labels: Vec::new(),
            total: None,
        },
        HistogramConfig {
            name: "response.bytes".to_string(),
            tags: Default::default(),
            domain: Domain::Uint,
            summed: true,
            layout: LayoutConfig::Weighted {
                weights: [512, 1024, 4096, 16384, 65536]
                    .into_iter()
                    .map(BoundaryValue::Int)
                    .collect(),
            },
            label_prefix: None,
            labels: vec!["small".to_string(), "medium".to_string()],
            total: Some("response.total".to_string()),
        },
        HistogramConfig {
            name: "cache.hit_ratio".to_string(),
            tags: Default::default(),
            domain: Domain::Float,
            summed: false,
            layout: LayoutConfig::Fixed {
                start: BoundaryValue::Float(0.0),
                end: BoundaryValue::Float(1.0),
                width: BoundaryValue::Float(0.25),
            },
            label_prefix: None,
            labels: Vec::new(),
            total: None,
        },
    ]
}

struct Scalars {
    requests: Arc<Counter>,
    inflight: Arc<Gauge>,
    throughput: Arc<Rate>,
    events: Arc<Meter>,
}

impl Scalars {
    fn register(registry: &Registry) -> Result<Self, tagged_metrics::RegistryError> {
        let requests = Counter::get_or_register(registry, "requests")?;
        let up = Arc::clone(&requests);
        Healthcheck::new_registered(registry, "requests.flowing", move |_| up.count() > 0)?;
        Ok(Self {
            requests,
            inflight: Gauge::get_or_register(registry, "inflight")?,
            throughput: Rate::get_or_register(registry, "throughput")?,
            events: Meter::get_or_register(registry, "events")?,
        })
    }
}

/// Feeds `iterations` observations to every histogram.
fn run_round(
    histograms: &[Arc<dyn Metric>],
    scalars: &Scalars,
    rng: &mut ChaCha20Rng,
    iterations: u64,
) {
    for _ in 0..iterations {
        for metric in histograms {
            observe(metric.as_ref(), rng);
        }
        scalars.requests.inc();
        scalars.events.mark(1);
    }
    scalars.inflight.update((rng.next_u32() % 64) as i64);

    match chrono::Utc::now().timestamp_nanos_opt() {
        Some(now) => scalars
            .throughput
            .update(scalars.requests.count() as f64, now),
        None => warn!("Clock out of range, skipping rate sample"),
    }
}

/// Records one synthetic observation spread over twice the histogram's
/// finite boundary range, so the overflow bucket sees traffic too.
fn observe(metric: &dyn Metric, rng: &mut ChaCha20Rng) {
    let unit = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
    if let Some(h) = metric.downcast_ref::<BucketHistogram<i64>>() {
        let top = finite_top(h.weights()) as f64;
        h.add((unit * top * 2.0) as i64);
    } else if let Some(h) = metric.downcast_ref::<BucketHistogram<u64>>() {
        let top = finite_top(h.weights()) as f64;
        h.add((unit * top * 2.0) as u64);
    } else if let Some(h) = metric.downcast_ref::<BucketHistogram<f64>>() {
        h.add(unit * finite_top(h.weights()) * 2.0);
    }
}

fn finite_top<T: Copy>(weights: &[T]) -> T {
    weights[weights.len().saturating_sub(2)]
}

/// Logs every metric the way a reporter would discover it.
fn report(registry: &Registry, minimize_lock: bool, flush: bool) {
    let walked = registry.each::<std::convert::Infallible, _>(
        |name, tags, _, metric| {
            let id = format!("{name}{tags}");
            if let Some(h) = metric.as_histogram() {
                let values = if flush { h.clear() } else { h.values() };
                let buckets: Vec<String> = h
                    .labels()
                    .iter()
                    .zip(&values)
                    .map(|(label, count)| format!("{label}={count}"))
                    .collect();
                info!(
                    metric = %id,
                    summed = h.is_summed(),
                    total = %h.name_total(),
                    "{}",
                    buckets.join(" ")
                );
            } else if let Some(reading) = Reading::of(metric.as_ref()) {
                info!(metric = %id, ?reading);
            }
            Ok(())
        },
        minimize_lock,
    );
    if let Err(never) = walked {
        match never {}
    }
}
