//! Registry and histogram behaviour under concurrent callers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tagged_metrics::{
    tags, BucketHistogram, Counter, CounterMetric, Metric, Registry,
};

const THREADS: usize = 8;

#[test]
fn test_concurrent_get_or_register_single_instance() {
    let registry = Registry::new();
    let built = AtomicUsize::new(0);
    let barrier = Barrier::new(THREADS);

    let handles: Vec<Arc<dyn Metric>> = thread::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    registry
                        .get_or_register_with("shared", || {
                            built.fetch_add(1, Ordering::SeqCst);
                            Arc::new(Counter::new())
                        })
                        .unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for handle in &handles[1..] {
        assert!(<dyn Metric>::same_instance(&handles[0], handle));
    }
    assert!(built.load(Ordering::SeqCst) >= 1);

    let mut seen = 0;
    registry
        .each::<(), _>(
            |name, _, _, _| {
                assert_eq!(name, "shared");
                seen += 1;
                Ok(())
            },
            false,
        )
        .unwrap();
    assert_eq!(seen, 1);
}

#[test]
fn test_concurrent_tagged_registration_any_order() {
    let registry = Registry::new();

    let counters: Vec<Arc<Counter>> = thread::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|i| {
                let registry = &registry;
                s.spawn(move || {
                    let t = if i % 2 == 0 {
                        tags([("region", "eu"), ("host", "a")])
                    } else {
                        tags([("host", "a"), ("region", "eu")])
                    };
                    let c = Counter::get_or_register_tagged(registry, "hits", &t).unwrap();
                    c.inc();
                    c
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(registry.len(), 1);
    assert_eq!(counters[0].count(), THREADS as i64);
    let found = registry
        .get_tagged("hits", &tags([("host", "a"), ("region", "eu")]))
        .unwrap();
    assert_eq!(found.as_counter().unwrap().count(), THREADS as i64);
}

#[test]
fn test_concurrent_adds_are_all_counted() {
    let exclusive = BucketHistogram::<i64>::fixed(0, 100, 10);
    let summed = BucketHistogram::<i64>::weighted_summed(&[10, 50, 90], &[]);
    let per_thread = 1_000;

    thread::scope(|s| {
        for t in 0..THREADS {
            let (exclusive, summed) = (&exclusive, &summed);
            s.spawn(move || {
                for i in 0..per_thread {
                    let v = ((t * per_thread + i) % 120) as i64;
                    exclusive.add(v);
                    summed.add(v);
                }
            });
        }
    });

    let total = (THREADS * per_thread) as u64;
    assert_eq!(exclusive.values().iter().sum::<u64>(), total);
    let values = summed.values();
    assert_eq!(values[values.len() - 1], total);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_clear_while_adding_loses_nothing() {
    let h = BucketHistogram::<u64>::fixed(0, 10, 1);
    let adds_per_thread = 5_000u64;
    let writers = 4;

    let flushed: u64 = thread::scope(|s| {
        for _ in 0..writers {
            s.spawn(|| {
                for i in 0..adds_per_thread {
                    h.add(i % 12);
                }
            });
        }
        let flusher = s.spawn(|| {
            let mut flushed = 0u64;
            for _ in 0..100 {
                flushed += h.clear().iter().sum::<u64>();
                thread::yield_now();
            }
            flushed
        });
        flusher.join().unwrap()
    });

    let remaining: u64 = h.values().iter().sum();
    assert_eq!(flushed + remaining, writers * adds_per_thread);
}

#[test]
fn test_minimal_lock_walk_during_registration() {
    let registry = Registry::new();
    for i in 0..32 {
        Counter::new_registered(&registry, &format!("seed.{i}")).unwrap();
    }

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let name = format!("churn.{i}");
                Counter::get_or_register(&registry, &name).unwrap();
                registry.unregister(&name);
            }
        });
        s.spawn(|| {
            for _ in 0..50 {
                let mut seeds = 0;
                registry
                    .each::<(), _>(
                        |name, _, _, metric| {
                            if name.starts_with("seed.") {
                                seeds += 1;
                            }
                            assert!(metric.as_counter().is_some());
                            Ok(())
                        },
                        true,
                    )
                    .unwrap();
                assert_eq!(seeds, 32);
            }
        });
    });

    assert_eq!(registry.len(), 32);
}

#[test]
fn test_counter_via_capability_view() {
    let registry = Registry::new();
    let c: Arc<dyn Metric> = Arc::new(Counter::new());
    registry.register("c", Arc::clone(&c)).unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let handle = registry.get("c").unwrap();
                let counter: &dyn CounterMetric = handle.as_counter().unwrap();
                for _ in 0..100 {
                    counter.add(1);
                }
            });
        }
    });

    assert_eq!(c.as_counter().unwrap().clear(), (THREADS * 100) as i64);
}
