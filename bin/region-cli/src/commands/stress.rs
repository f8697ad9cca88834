// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `region-rt stress` command: concurrent allocate/write/verify/release.
//!
//! Every worker repeatedly allocates `8 * rand[1, K]` bytes, fills them
//! with a seed-dependent pattern, yields, then checks the pattern before
//! releasing. Any foreign write means two live allocations overlapped.
//! Opaque leaves have no addressable memory, so only the allocator
//! bookkeeping is exercised for them.

use crate::config::StackConfig;
use alloc_core::{AllocError, Allocator, AllocatorExt, Strategy};
use best_fit::{BestFitAllocator, LockedAllocator};
use std::time::Instant;

const WORD: usize = std::mem::size_of::<u64>();

/// What one worker did.
#[derive(Debug, Default, Clone, Copy)]
struct WorkerReport {
    allocations: u64,
    bytes: u64,
    verified: u64,
    /// Iterations skipped because the region had no fitting chunk.
    out_of_memory: u64,
}

impl WorkerReport {
    fn merge(mut self, other: WorkerReport) -> Self {
        self.allocations += other.allocations;
        self.bytes += other.bytes;
        self.verified += other.verified;
        self.out_of_memory += other.out_of_memory;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Workload {
    iterations: usize,
    max_elements: usize,
    strategy: Strategy,
}

fn worker<A: Allocator + ?Sized>(
    allocator: &A,
    workload: Workload,
    seed: u64,
) -> anyhow::Result<WorkerReport> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut report = WorkerReport::default();

    for _ in 0..workload.iterations {
        let elements = rng.usize(1..=workload.max_elements);
        let size = elements * WORD;
        let mut allocation = match allocator.allocate(size, workload.strategy) {
            Ok(a) => a,
            Err(AllocError::OutOfMemory { .. }) => {
                // Skip this round; others may release space meanwhile.
                report.out_of_memory += 1;
                std::thread::yield_now();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        report.allocations += 1;
        report.bytes += size as u64;

        if let Some(data) = allocation.as_mut_slice() {
            for (j, word) in data.chunks_exact_mut(WORD).enumerate() {
                word.copy_from_slice(&(j as u64 ^ seed).to_ne_bytes());
            }
        }

        std::thread::yield_now();

        if let Some(data) = allocation.as_slice() {
            for (j, word) in data.chunks_exact(WORD).enumerate() {
                let mut bytes = [0u8; WORD];
                bytes.copy_from_slice(word);
                if u64::from_ne_bytes(bytes) != j as u64 ^ seed {
                    anyhow::bail!(
                        "worker {seed}: word {j} of the {size}-byte allocation at {:p} was overwritten",
                        allocation.ptr()
                    );
                }
            }
            report.verified += 1;
        }

        allocation.release()?;
    }
    Ok(report)
}

fn run_locked<L: Allocator + ?Sized + Sync>(
    allocator: BestFitAllocator<'_, L>,
    workload: Workload,
    threads: usize,
    seed: u64,
) -> anyhow::Result<(BestFitAllocator<'_, L>, WorkerReport)> {
    let locked = LockedAllocator::new(allocator);

    let results: Vec<anyhow::Result<WorkerReport>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads as u64)
            .map(|i| {
                let locked = &locked;
                scope.spawn(move || worker(locked, workload, seed.wrapping_add(i)))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("worker thread panicked")))
            })
            .collect()
    });

    let mut total = WorkerReport::default();
    for result in results {
        total = total.merge(result?);
    }
    Ok((locked.into_inner()?, total))
}

pub fn execute(
    config: &StackConfig,
    threads: usize,
    iterations: usize,
    max_elements: usize,
    seed: u64,
) -> anyhow::Result<()> {
    if threads == 0 || max_elements == 0 {
        anyhow::bail!("--threads and --max-elements must be at least 1");
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║           region-rt · Stress                         ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let kind = config.leaf_kind()?;
    let workload = Workload {
        iterations,
        max_elements,
        strategy: config.strategy()?,
    };
    let leaf = kind.build(config.device);
    let region = leaf.allocate(config.region_bytes()?, workload.strategy)?;
    let allocator = BestFitAllocator::new(region)?;

    println!("  Leaf:        {kind} ({})", allocator.place());
    println!("  Region:      {:.2} MB", allocator.capacity() as f64 / (1024.0 * 1024.0));
    println!("  Workers:     {threads} x {iterations} allocations of 8..={} bytes", max_elements * WORD);
    println!("  Locked:      {}", config.thread_safe);
    if !kind.is_addressable() {
        println!("  Note:        {kind} regions have no host pointer; patterns are not verified");
    }
    println!();

    let started = Instant::now();
    let (allocator, report) = if config.thread_safe {
        run_locked(allocator, workload, threads, seed)?
    } else {
        if threads > 1 {
            anyhow::bail!("thread_safe = false allows a single worker, got {threads}");
        }
        let report = worker(&allocator, workload, seed)?;
        (allocator, report)
    };
    let elapsed = started.elapsed();

    // ── Results ────────────────────────────────────────────────
    let stats = allocator.stats();
    println!("  Allocations: {}", report.allocations);
    println!("  Verified:    {}", report.verified);
    println!("  OOM skips:   {}", report.out_of_memory);
    println!("  Bytes:       {:.2} MB", report.bytes as f64 / (1024.0 * 1024.0));
    println!("  Elapsed:     {:.2?}", elapsed);
    println!("  Stats:       {}", stats.summary());
    println!();

    allocator.validate()?;
    let free_chunks = allocator.num_free_chunks();
    if free_chunks != 1 {
        anyhow::bail!("region did not coalesce back: {free_chunks} free chunks remain");
    }
    println!("  OK: region returned to a single free chunk");
    tracing::info!("stress finished in {elapsed:.2?}");
    Ok(())
}
