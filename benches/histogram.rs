//! Benchmarks for histogram hot paths.
//!
//! - Fixed-width classification (O(1) index computation)
//! - Weighted classification across boundary counts (binary search)
//! - Summed adds, which touch a suffix of the bucket array
//!
//! Run with: cargo bench --bench histogram

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tagged_metrics::BucketHistogram;

/// Boundaries `10, 100, 200, ...` with `count` entries.
fn make_weights(count: usize) -> Vec<i64> {
    std::iter::once(10)
        .chain((1..count as i64).map(|i| i * 100))
        .collect()
}

fn bench_fixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram/fixed");
    group.throughput(Throughput::Elements(1));

    let h = BucketHistogram::<i64>::fixed(10, 100, 10);
    group.bench_function("add", |b| b.iter(|| h.add(black_box(50))));

    let summed = BucketHistogram::<i64>::fixed_summed(10, 100, 10);
    group.bench_function("add_summed", |b| b.iter(|| summed.add(black_box(50))));

    let floats = BucketHistogram::<f64>::fixed(0.0, 1.0, 0.05);
    group.bench_function("add_f64", |b| b.iter(|| floats.add(black_box(0.42))));

    group.bench_function("add_values", |b| {
        b.iter(|| {
            h.add(black_box(50));
            black_box(h.values())
        })
    });

    group.finish();
}

fn bench_weighted(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram/weighted");
    group.throughput(Throughput::Elements(1));

    for count in [5, 20, 100] {
        let h = BucketHistogram::<i64>::weighted(&make_weights(count), &[]);
        group.bench_with_input(BenchmarkId::new("add", count), &count, |b, _| {
            b.iter(|| h.add(black_box(50)))
        });

        let summed = BucketHistogram::<i64>::weighted_summed(&make_weights(count), &[]);
        group.bench_with_input(BenchmarkId::new("add_summed", count), &count, |b, _| {
            b.iter(|| summed.add(black_box(50)))
        });
    }

    group.finish();
}

fn bench_flush(c: &mut Criterion) {
    let weights: Vec<u64> = make_weights(20).into_iter().map(|w| w as u64).collect();
    let h = BucketHistogram::<u64>::weighted(&weights, &[]);
    c.bench_function("histogram/clear", |b| {
        b.iter(|| {
            h.add(black_box(150));
            black_box(h.clear())
        })
    });
    c.bench_function("histogram/snapshot", |b| b.iter(|| black_box(h.snapshot())));
}

criterion_group!(benches, bench_fixed, bench_weighted, bench_flush);
criterion_main!(benches);
