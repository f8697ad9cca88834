// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Opaque device-region leaf.
//!
//! Models memory the host cannot address directly, such as an
//! accelerator's global memory. Regions carry a size and a
//! [`Place::Device`] tag but no pointer, which also makes this leaf the
//! cheap way to back very large logical regions in tests.

use crate::registry::{poisoned, LeafStats, Registry};
use alloc_core::{AllocError, Allocator, AllocatorId, Place, RawAllocation, Strategy, Ticket};
use std::sync::Mutex;

/// Hands out pointer-less regions tagged with a device ordinal.
///
/// An optional capacity caps the bytes reserved at once, the way a real
/// device has finite memory.
pub struct OpaqueAllocator {
    id: AllocatorId,
    ordinal: u32,
    capacity: Option<usize>,
    registry: Mutex<Registry<()>>,
}

impl OpaqueAllocator {
    /// An unbounded device leaf.
    pub fn new(ordinal: u32) -> Self {
        let id = AllocatorId::next();
        tracing::info!("opaque leaf #{} created for device {ordinal}", id.get());
        Self {
            id,
            ordinal,
            capacity: None,
            registry: Mutex::new(Registry::new()),
        }
    }

    /// A device leaf that refuses to reserve more than `capacity` bytes.
    pub fn with_capacity(ordinal: u32, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(ordinal)
        }
    }

    pub fn place(&self) -> Place {
        Place::Device(self.ordinal)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn stats(&self) -> LeafStats {
        self.registry
            .lock()
            .map(|r| r.stats())
            .unwrap_or_default()
    }
}

impl Allocator for OpaqueAllocator {
    fn allocate_raw(&self, size: usize, _strategy: Strategy) -> Result<RawAllocation, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidRequest("cannot reserve a zero-sized region".into()));
        }

        let mut registry = self.registry.lock().map_err(|_| poisoned("opaque"))?;
        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(registry.live_bytes());
            if size > available {
                tracing::warn!(
                    "device {}: cannot reserve {size} bytes, {available} available",
                    self.ordinal
                );
                return Err(AllocError::OutOfMemory {
                    requested: size,
                    largest_free: available,
                });
            }
        }

        let slot = registry.next_slot();
        registry.insert(slot, size, ());

        let ticket = Ticket::new(self.id, slot, 0);
        // No pointer, so there is no range to vouch for.
        Ok(unsafe { RawAllocation::new(None, size, self.place(), ticket) })
    }

    fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError> {
        self.registry
            .lock()
            .map_err(|_| poisoned("opaque"))?
            .remove(self.id, &raw)
    }
}

impl std::fmt::Debug for OpaqueAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueAllocator")
            .field("id", &self.id.get())
            .field("place", &self.place())
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc_core::AllocatorExt;

    #[test]
    fn test_no_pointer() {
        let leaf = OpaqueAllocator::new(2);
        let mut region = leaf.allocate(4 << 30, Strategy::Default).unwrap();
        assert!(region.ptr().is_null());
        assert!(region.as_mut_slice().is_none());
        assert_eq!(region.place(), Place::Device(2));
        assert_eq!(region.size(), 4 << 30);
    }

    #[test]
    fn test_capacity_enforced() {
        let leaf = OpaqueAllocator::with_capacity(0, 1000);
        let a = leaf.allocate(600, Strategy::Default).unwrap();
        let err = leaf.allocate(600, Strategy::Default).unwrap_err();
        assert_eq!(
            err,
            AllocError::OutOfMemory {
                requested: 600,
                largest_free: 400
            }
        );

        drop(a);
        assert!(leaf.allocate(1000, Strategy::Default).is_ok());
    }

    #[test]
    fn test_stats() {
        let leaf = OpaqueAllocator::new(0);
        let a = leaf.allocate(10, Strategy::Default).unwrap();
        let b = leaf.allocate(20, Strategy::Default).unwrap();
        drop(a);
        let stats = leaf.stats();
        assert_eq!(stats.live_bytes, 20);
        assert_eq!(stats.peak_bytes, 30);
        assert_eq!(stats.total_reservations, 2);
        drop(b);
    }
}
