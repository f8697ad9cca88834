// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for best-fit allocation and release.

use alloc_core::{AllocatorExt, Strategy};
use best_fit::{BestFitAllocator, LockedAllocator};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use leaf_memory::OpaqueAllocator;

const REGION: usize = 1 << 30;

fn bench_allocate_release(c: &mut Criterion) {
    let leaf = OpaqueAllocator::new(0);
    let alloc = BestFitAllocator::new(leaf.allocate(REGION, Strategy::Default).unwrap()).unwrap();

    let mut group = c.benchmark_group("allocate_release");
    for size in [64usize, 4096, 1 << 20] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let a = alloc.allocate(black_box(size), Strategy::Default).unwrap();
                drop(a);
            })
        });
    }
    group.finish();
}

fn bench_fragmented(c: &mut Criterion) {
    let leaf = OpaqueAllocator::new(0);
    let alloc = BestFitAllocator::new(leaf.allocate(REGION, Strategy::Default).unwrap()).unwrap();

    // Leave a few thousand holes of varied sizes behind.
    let mut rng = fastrand::Rng::with_seed(7);
    let mut live: Vec<_> = (0..8192)
        .map(|_| alloc.allocate(rng.usize(16..=8192), Strategy::Default).unwrap())
        .collect();
    let mut i = 0;
    live.retain(|_| {
        i += 1;
        i % 2 == 0
    });

    c.bench_function("allocate_release_fragmented", |b| {
        b.iter(|| {
            let a = alloc.allocate(black_box(rng.usize(16..=8192)), Strategy::Default).unwrap();
            drop(a);
        })
    });
    drop(live);
}

fn bench_locked(c: &mut Criterion) {
    let leaf = OpaqueAllocator::new(0);
    let region = leaf.allocate(REGION, Strategy::Default).unwrap();
    let locked = LockedAllocator::new(BestFitAllocator::new(region).unwrap());

    c.bench_function("locked_allocate_release", |b| {
        b.iter(|| {
            let a = locked.allocate(black_box(256), Strategy::Default).unwrap();
            drop(a);
        })
    });
}

criterion_group!(benches, bench_allocate_release, bench_fragmented, bench_locked);
criterion_main!(benches);
