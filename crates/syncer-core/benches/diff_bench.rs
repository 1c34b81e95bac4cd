// Benchmarks for the diff engine
// Measures plan computation for steady-state and churned upstreams

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use syncer_common::Instance;
use syncer_core::diff_instances;

fn members(count: usize, weight: f64) -> Vec<Instance> {
    (0..count)
        .map(|i| Instance::new(format!("10.{}.{}.{}", i / 65536, i / 256 % 256, i % 256), 8080, weight))
        .collect()
}

fn bench_diff_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_steady_state");
    for size in [10, 100, 1000] {
        let discovery = members(size, 1.0);
        let gateway = discovery.iter().rev().cloned().collect::<Vec<_>>();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| diff_instances(black_box(&discovery), black_box(&gateway)))
        });
    }
    group.finish();
}

fn bench_diff_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_churn");
    for size in [10, 100, 1000] {
        let discovery = members(size, 2.0);
        // half reweighted, a quarter gone, a quarter new
        let mut gateway = members(size / 2, 1.0);
        gateway.extend(members(size + size / 4, 2.0).into_iter().skip(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| diff_instances(black_box(&discovery), black_box(&gateway)))
        });
    }
    group.finish();
}

fn bench_diff_full_replace(c: &mut Criterion) {
    let discovery = members(500, 1.0);
    let gateway: Vec<Instance> = Vec::new();
    c.bench_function("diff_empty_gateway_500", |b| {
        b.iter(|| diff_instances(black_box(&discovery), black_box(&gateway)))
    });
}

criterion_group!(
    benches,
    bench_diff_steady_state,
    bench_diff_churn,
    bench_diff_full_replace
);
criterion_main!(benches);
