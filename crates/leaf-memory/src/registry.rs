// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bookkeeping shared by the leaf providers.
//!
//! Each leaf keeps a [`Registry`] of the regions it has handed out so that
//! a release can be checked against what is actually live, and so that
//! [`LeafStats`] can report usage.

use alloc_core::{AllocError, AllocatorId, RawAllocation};
use std::collections::HashMap;

/// Usage counters for a leaf provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct LeafStats {
    /// Regions currently handed out.
    pub live_regions: usize,
    /// Bytes currently handed out.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_bytes: usize,
    /// Regions ever reserved.
    pub total_reservations: u64,
    /// Regions ever returned.
    pub total_releases: u64,
}

impl LeafStats {
    pub fn summary(&self) -> String {
        format!(
            "{} live regions ({} bytes, peak {} bytes), {} reserved, {} released",
            self.live_regions,
            self.live_bytes,
            self.peak_bytes,
            self.total_reservations,
            self.total_releases,
        )
    }
}

/// Live regions of one leaf, keyed by slot, with the payload the leaf
/// needs to give each region back (a layout, a mapping, ...).
pub(crate) struct Registry<V> {
    regions: HashMap<usize, (usize, V)>,
    next_slot: usize,
    stats: LeafStats,
}

impl<V> Registry<V> {
    pub(crate) fn new() -> Self {
        Self {
            regions: HashMap::new(),
            next_slot: 0,
            stats: LeafStats::default(),
        }
    }

    /// Draws a slot number no live region uses.
    pub(crate) fn next_slot(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot = self.next_slot.wrapping_add(1);
        slot
    }

    pub(crate) fn insert(&mut self, slot: usize, size: usize, payload: V) {
        self.regions.insert(slot, (size, payload));
        self.stats.live_regions += 1;
        self.stats.live_bytes += size;
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);
        self.stats.total_reservations += 1;
    }

    /// Removes the region named by `raw`, checking it belongs to `owner`
    /// and matches what was handed out.
    pub(crate) fn remove(&mut self, owner: AllocatorId, raw: &RawAllocation) -> Result<V, AllocError> {
        let ticket = raw.ticket();
        if ticket.owner() != owner {
            return Err(AllocError::InvalidHandle(format!(
                "region {ticket} was not allocated by leaf #{}",
                owner.get()
            )));
        }
        match self.regions.get(&ticket.slot()) {
            Some(&(size, _)) if size == raw.size() => {}
            Some(&(size, _)) => {
                return Err(AllocError::InvalidHandle(format!(
                    "region {ticket} is {size} bytes, release claims {}",
                    raw.size()
                )))
            }
            None => {
                return Err(AllocError::InvalidHandle(format!("region {ticket} is not live")));
            }
        }
        let (size, payload) = self
            .regions
            .remove(&ticket.slot())
            .ok_or_else(|| AllocError::Corrupted(format!("region {ticket} vanished")))?;
        self.stats.live_regions -= 1;
        self.stats.live_bytes -= size;
        self.stats.total_releases += 1;
        Ok(payload)
    }

    pub(crate) fn live_bytes(&self) -> usize {
        self.stats.live_bytes
    }

    pub(crate) fn stats(&self) -> LeafStats {
        self.stats.clone()
    }

    /// Takes every region still live, for teardown.
    pub(crate) fn drain(&mut self) -> Vec<(usize, usize, V)> {
        self.stats.live_regions = 0;
        self.stats.live_bytes = 0;
        self.regions
            .drain()
            .map(|(slot, (size, payload))| (slot, size, payload))
            .collect()
    }
}

pub(crate) fn poisoned(what: &str) -> AllocError {
    AllocError::Corrupted(format!("{what} registry lock poisoned"))
}
