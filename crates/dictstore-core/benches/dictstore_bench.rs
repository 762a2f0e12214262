//! Lookup and build cost per strategy on a synthetic locale bundle.

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dictstore_core::{Config, Interner, Strategy, StoreFactory};

const STRATEGIES: [Strategy; 3] = [Strategy::Plain, Strategy::ValueCompact, Strategy::Compressed];

fn bundle(n: usize) -> HashMap<String, String> {
    (0..n)
        .map(|i| {
            (
                format!("admin.scheme.section{}.distiller.service.field{}", i % 40, i),
                format!("Localized text number {}", i),
            )
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let source = bundle(20_000);
    let mut group = c.benchmark_group("build");
    for strategy in STRATEGIES {
        group.bench_with_input(BenchmarkId::from_parameter(strategy), &strategy, |b, &strategy| {
            let factory = StoreFactory::with_interner(Config::default(), Arc::new(Interner::new()));
            b.iter(|| factory.build_with(strategy, source.iter()))
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let source = bundle(20_000);
    let keys: Vec<&String> = source.keys().take(1_000).collect();
    let factory = StoreFactory::with_interner(Config::default(), Arc::new(Interner::new()));

    let mut group = c.benchmark_group("get");
    for strategy in STRATEGIES {
        let store = factory.build_with(strategy, source.iter());
        eprintln!("{}: ~{} heap bytes", strategy, store.approx_heap_bytes());
        group.bench_function(BenchmarkId::from_parameter(strategy), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(store.get(key));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_get);
criterion_main!(benches);
