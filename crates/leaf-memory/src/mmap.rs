// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Anonymous memory-mapping leaf.
//!
//! Large reservations are better served straight from the kernel: the
//! mapping is page-aligned, zero-filled on first touch, and unmapped in
//! one call when released.

use crate::registry::{poisoned, LeafStats, Registry};
use alloc_core::{AllocError, Allocator, AllocatorId, Place, RawAllocation, Strategy, Ticket};
use std::ptr::NonNull;
use std::sync::Mutex;

/// Hands out private anonymous mappings via `memmap2`.
pub struct MmapAllocator {
    id: AllocatorId,
    registry: Mutex<Registry<memmap2::MmapMut>>,
}

impl MmapAllocator {
    pub fn new() -> Self {
        let id = AllocatorId::next();
        tracing::info!("mmap leaf #{} created", id.get());
        Self {
            id,
            registry: Mutex::new(Registry::new()),
        }
    }

    pub fn stats(&self) -> LeafStats {
        self.registry
            .lock()
            .map(|r| r.stats())
            .unwrap_or_default()
    }
}

impl Default for MmapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for MmapAllocator {
    fn allocate_raw(&self, size: usize, _strategy: Strategy) -> Result<RawAllocation, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidRequest("cannot map a zero-sized region".into()));
        }

        let mut map = memmap2::MmapMut::map_anon(size).map_err(|e| {
            AllocError::Backend(format!("anonymous mmap of {size} bytes failed: {e}"))
        })?;
        let ptr = NonNull::new(map.as_mut_ptr())
            .ok_or_else(|| AllocError::Backend("mmap returned a null mapping".into()))?;

        let mut registry = self.registry.lock().map_err(|_| poisoned("mmap"))?;
        let slot = registry.next_slot();
        // Moving the handle does not move the mapping.
        registry.insert(slot, size, map);

        tracing::debug!(
            "mmap leaf: mapped {:.2} MB at {ptr:p}",
            size as f64 / (1024.0 * 1024.0)
        );

        let ticket = Ticket::new(self.id, slot, 0);
        // The mapping stays alive in the registry until `release_raw`.
        Ok(unsafe { RawAllocation::new(Some(ptr), size, Place::Host, ticket) })
    }

    fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError> {
        let map = self
            .registry
            .lock()
            .map_err(|_| poisoned("mmap"))?
            .remove(self.id, &raw)?;
        drop(map);
        tracing::debug!("mmap leaf: unmapped {} bytes", raw.size());
        Ok(())
    }
}

impl std::fmt::Debug for MmapAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapAllocator")
            .field("id", &self.id.get())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc_core::AllocatorExt;

    #[test]
    fn test_map_write_unmap() {
        let leaf = MmapAllocator::new();
        let mut region = leaf.allocate(1 << 20, Strategy::Default).unwrap();
        assert_eq!(region.size(), 1 << 20);
        assert!(region.as_slice().unwrap().iter().all(|&b| b == 0));

        let bytes = region.as_mut_slice().unwrap();
        bytes[0] = 1;
        bytes[(1 << 20) - 1] = 2;
        assert_eq!(region.as_slice().unwrap()[(1 << 20) - 1], 2);
        assert_eq!(leaf.stats().live_regions, 1);

        drop(region);
        assert_eq!(leaf.stats().live_regions, 0);
    }

    #[test]
    fn test_mapping_is_page_aligned() {
        let leaf = MmapAllocator::new();
        let region = leaf.allocate(100, Strategy::Default).unwrap();
        assert_eq!(region.ptr() as usize % 4096, 0);
    }

    #[test]
    fn test_zero_size_rejected() {
        let leaf = MmapAllocator::new();
        assert!(leaf.allocate(0, Strategy::Default).is_err());
    }

    #[test]
    fn test_double_release_rejected() {
        let leaf = MmapAllocator::new();
        let raw = leaf.allocate_raw(4096, Strategy::Default).unwrap();
        let ticket = raw.ticket();
        leaf.release_raw(raw).unwrap();

        let forged = unsafe { RawAllocation::new(None, 4096, Place::Host, ticket) };
        let err = leaf.release_raw(forged).unwrap_err();
        assert!(matches!(err, AllocError::InvalidHandle(_)));
    }
}
