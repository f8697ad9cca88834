// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and diagnostics.
//!
//! [`AllocationStats`] tracks cumulative metrics about how a best-fit
//! allocator is being used: how often requests reuse a chunk exactly,
//! how often they split one, how much coalescing happens on release, and
//! how many requests ran out of space.

/// Cumulative statistics about a best-fit allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Successful allocation requests.
    pub total_allocations: u64,
    /// Allocations served by a free chunk of exactly the requested size.
    pub exact_fits: u64,
    /// Allocations that split a larger free chunk.
    pub splits: u64,
    /// Requests that failed because no free chunk was large enough.
    pub oom_count: u64,
    /// Successful releases.
    pub total_releases: u64,
    /// Merges of adjacent free chunks performed on release.
    pub merges: u64,
    /// Bytes currently allocated.
    pub allocated_bytes: usize,
    /// Peak of `allocated_bytes`.
    pub peak_allocated_bytes: usize,
    /// Total bytes ever allocated.
    pub cumulative_allocated_bytes: u64,
}

impl AllocationStats {
    /// Fraction of successful allocations that were exact fits, in `[0.0, 1.0]`.
    ///
    /// Returns `0.0` if no allocations have been made.
    pub fn exact_fit_ratio(&self) -> f64 {
        if self.total_allocations == 0 {
            return 0.0;
        }
        self.exact_fits as f64 / self.total_allocations as f64
    }

    pub(crate) fn record_exact_fit(&mut self, size: usize) {
        self.exact_fits += 1;
        self.record_allocation(size);
    }

    pub(crate) fn record_split(&mut self, size: usize) {
        self.splits += 1;
        self.record_allocation(size);
    }

    fn record_allocation(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cumulative_allocated_bytes += size as u64;
        self.allocated_bytes += size;
        if self.allocated_bytes > self.peak_allocated_bytes {
            self.peak_allocated_bytes = self.allocated_bytes;
        }
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_release(&mut self, size: usize) {
        self.total_releases += 1;
        self.allocated_bytes -= size;
    }

    pub(crate) fn record_merge(&mut self) {
        self.merges += 1;
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_mb = self.peak_allocated_bytes as f64 / (1024.0 * 1024.0);
        format!(
            "Allocations: {} total ({} exact, {} split, {:.0}% exact), \
             {} OOMs, {} releases, {} merges, peak {:.2} MB",
            self.total_allocations,
            self.exact_fits,
            self.splits,
            self.exact_fit_ratio() * 100.0,
            self.oom_count,
            self.total_releases,
            self.merges,
            peak_mb,
        )
    }
}
