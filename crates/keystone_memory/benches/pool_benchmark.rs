//! # Pool Allocator Benchmark
//!
//! ARCHITECT'S REQUIREMENTS:
//! - Allocate/free pairs in constant time regardless of pool occupancy
//! - Routing cost bounded by the (small) size-class table
//! - Compaction linear in pool capacity
//!
//! Run with: `cargo bench --package keystone_memory`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keystone_memory::{Handle, MemoryConfig, MemoryManager};

/// Blocks in the benchmark pools.
const BLOCKS: u32 = 65_536;

fn manager() -> MemoryManager {
    MemoryManager::new(&MemoryConfig::from_pairs(&[
        (16, BLOCKS),
        (64, BLOCKS),
        (256, BLOCKS / 4),
    ]))
    .unwrap()
}

/// Benchmark: one allocate + free pair at varying occupancy.
fn bench_allocate_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_free");

    for occupancy in [0u32, 50, 99] {
        let mut memory = manager();
        let held = BLOCKS * occupancy / 100;
        let _held: Vec<Handle> = (0..held).map(|_| memory.allocate(16).unwrap()).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{occupancy}%")),
            &occupancy,
            |b, _| {
                b.iter(|| {
                    let h = memory.allocate(black_box(16)).unwrap();
                    memory.free(black_box(h)).unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: routing across the default catalogue.
fn bench_routing(c: &mut Criterion) {
    let mut memory = MemoryManager::with_default_classes().unwrap();

    c.bench_function("route_default_catalogue", |b| {
        let mut size = 1usize;
        b.iter(|| {
            size = if size >= 65_536 { 1 } else { size * 3 };
            let h = memory.allocate(black_box(size)).unwrap();
            memory.free(h).unwrap();
        });
    });
}

/// Benchmark: resolve a handle and touch its block.
fn bench_resolve(c: &mut Criterion) {
    let mut memory = manager();
    let h = memory.allocate(64).unwrap();

    c.bench_function("resolve_block", |b| {
        b.iter(|| black_box(memory.block(black_box(h)).unwrap()[0]));
    });
}

/// Benchmark: compaction of a half-empty pool.
fn bench_defragment(c: &mut Criterion) {
    c.bench_function("defragment_half_empty_64k", |b| {
        b.iter_batched(
            || {
                let mut memory = manager();
                let handles: Vec<Handle> =
                    (0..BLOCKS).map(|_| memory.allocate(16).unwrap()).collect();
                for h in handles.iter().step_by(2) {
                    memory.free(*h).unwrap();
                }
                memory
            },
            |mut memory| black_box(memory.defragment(0).unwrap()),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_allocate_free,
    bench_routing,
    bench_resolve,
    bench_defragment,
);

criterion_main!(benches);
