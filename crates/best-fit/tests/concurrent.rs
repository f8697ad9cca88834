// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Many threads sharing one best-fit allocator through the lock decorator.

use alloc_core::{Allocator, AllocatorExt, Strategy};
use best_fit::{BestFitAllocator, LockedAllocator};
use leaf_memory::HostAllocator;

const THREADS: u64 = 1024;
const ITERATIONS: usize = 128;
const MAX_ELEMENTS: usize = 1024;
const WORD: usize = std::mem::size_of::<u64>();

fn worker(allocator: &LockedAllocator<BestFitAllocator<'_, HostAllocator>>, seed: u64) {
    let mut rng = fastrand::Rng::with_seed(seed);
    for _ in 0..ITERATIONS {
        let elements = rng.usize(1..=MAX_ELEMENTS);
        let mut allocation = allocator
            .allocate(elements * WORD, Strategy::Default)
            .expect("region is large enough for every thread");

        let data = allocation.as_mut_slice().expect("host memory is addressable");
        for (j, word) in data.chunks_exact_mut(WORD).enumerate() {
            word.copy_from_slice(&(j as u64 ^ seed).to_ne_bytes());
        }

        std::thread::yield_now();

        let data = allocation.as_slice().expect("host memory is addressable");
        for (j, word) in data.chunks_exact(WORD).enumerate() {
            let mut bytes = [0u8; WORD];
            bytes.copy_from_slice(word);
            assert_eq!(u64::from_ne_bytes(bytes), j as u64 ^ seed, "thread {seed} saw a foreign write");
        }
    }
}

#[test]
fn test_concurrent_host_allocation() {
    let leaf = HostAllocator::new();
    let region = leaf.allocate(256 << 20, Strategy::Default).unwrap();
    let locked = LockedAllocator::new(BestFitAllocator::new(region).unwrap());

    std::thread::scope(|scope| {
        for seed in 0..THREADS {
            let locked = &locked;
            scope.spawn(move || worker(locked, seed));
        }
    });

    assert_eq!(locked.num_free_chunks(), 1);
    locked
        .with_locked(|inner| {
            inner.validate().unwrap();
            assert_eq!(inner.allocated_bytes(), 0);
            assert_eq!(inner.stats().total_allocations, THREADS * ITERATIONS as u64);
        })
        .unwrap();
}
