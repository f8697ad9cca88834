// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host heap leaf.

use crate::registry::{poisoned, LeafStats, Registry};
use alloc_core::{AllocError, Allocator, AllocatorId, Place, RawAllocation, Strategy, Ticket};
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::Mutex;

/// Hands out zero-initialised regions from the process heap.
///
/// Every call reserves a fresh region; nothing is subdivided. Regions are
/// aligned to [`HostAllocator::alignment`], so sub-allocations at offsets
/// that are multiples of a smaller power of two are aligned too.
///
/// # Thread Safety
/// `HostAllocator` is `Send + Sync`; its registry sits behind a `Mutex`.
pub struct HostAllocator {
    id: AllocatorId,
    alignment: usize,
    registry: Mutex<Registry<Layout>>,
}

impl HostAllocator {
    /// Default alignment of every region: one cache line.
    pub const DEFAULT_ALIGNMENT: usize = 64;

    pub fn new() -> Self {
        let leaf = Self {
            id: AllocatorId::next(),
            alignment: Self::DEFAULT_ALIGNMENT,
            registry: Mutex::new(Registry::new()),
        };
        tracing::info!("host leaf #{} created (alignment {})", leaf.id.get(), leaf.alignment);
        leaf
    }

    /// Creates a host leaf with a custom alignment (a power of two).
    pub fn with_alignment(alignment: usize) -> Result<Self, AllocError> {
        if !alignment.is_power_of_two() {
            return Err(AllocError::InvalidRequest(format!(
                "alignment must be a power of 2, got {alignment}"
            )));
        }
        Ok(Self {
            id: AllocatorId::next(),
            alignment,
            registry: Mutex::new(Registry::new()),
        })
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn stats(&self) -> LeafStats {
        self.registry
            .lock()
            .map(|r| r.stats())
            .unwrap_or_default()
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for HostAllocator {
    fn allocate_raw(&self, size: usize, _strategy: Strategy) -> Result<RawAllocation, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidRequest("cannot allocate zero-sized region".into()));
        }
        let layout = Layout::from_size_align(size, self.alignment)
            .map_err(|e| AllocError::InvalidRequest(format!("bad layout for {size} bytes: {e}")))?;

        let mut registry = self.registry.lock().map_err(|_| poisoned("host"))?;

        // Zeroed so that safe slice views never expose uninitialised bytes.
        let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or_else(|| {
            AllocError::Backend(format!("host allocation of {size} bytes failed"))
        })?;

        let slot = ptr.as_ptr() as usize;
        registry.insert(slot, size, layout);
        tracing::trace!("host leaf: reserved {size} bytes at {ptr:p}");

        let ticket = Ticket::new(self.id, slot, 0);
        // The heap block is ours until `release_raw` deallocates it.
        Ok(unsafe { RawAllocation::new(Some(ptr), size, Place::Host, ticket) })
    }

    fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError> {
        let ptr = raw.ptr().ok_or_else(|| {
            AllocError::InvalidHandle(format!("host region {} has no pointer", raw.ticket()))
        })?;
        let layout = self
            .registry
            .lock()
            .map_err(|_| poisoned("host"))?
            .remove(self.id, &raw)?;
        // The registry vouched for this block, so it came from `alloc_zeroed`.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        tracing::trace!("host leaf: released {} bytes", raw.size());
        Ok(())
    }
}

impl Drop for HostAllocator {
    fn drop(&mut self) {
        let leftover = match self.registry.get_mut() {
            Ok(registry) => registry.drain(),
            Err(_) => return,
        };
        if !leftover.is_empty() {
            tracing::warn!("host leaf dropped with {} regions still reserved", leftover.len());
        }
        for (slot, _, layout) in leftover {
            unsafe { alloc::dealloc(slot as *mut u8, layout) };
        }
    }
}

impl std::fmt::Debug for HostAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostAllocator")
            .field("id", &self.id.get())
            .field("alignment", &self.alignment)
            .field("stats", &self.stats())
            .finish()
    }
}
