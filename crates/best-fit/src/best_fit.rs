// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Best-fit sub-allocation over one fixed leaf region.
//!
//! [`BestFitAllocator`] takes ownership of a single region obtained from a
//! leaf and serves every request from it:
//!
//! 1. The [`FreeIndex`] yields the smallest free chunk that fits.
//! 2. An exact fit is handed out as is; a larger chunk is split and the
//!    remainder goes back into the index.
//! 3. On release the chunk is coalesced with a free predecessor and a free
//!    successor, so no two free chunks are ever adjacent.
//!
//! # Thread Safety
//! The allocator is `Send` but not `Sync`: its state sits in a `RefCell`
//! and assumes one caller at a time. Share it across threads by wrapping
//! it in a [`LockedAllocator`](crate::LockedAllocator).

use crate::free_index::FreeIndex;
use crate::ledger::{ChunkId, ChunkLedger};
use crate::stats::AllocationStats;
use alloc_core::{
    AllocError, Allocation, Allocator, AllocatorId, Place, RawAllocation, Strategy, Ticket,
};
use std::cell::RefCell;
use std::ptr::NonNull;

/// Snapshot of one chunk, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ChunkView {
    pub offset: usize,
    pub size: usize,
    pub is_free: bool,
}

/// Ledger, index and counters, mutated together.
#[derive(Debug)]
struct State {
    ledger: ChunkLedger,
    free: FreeIndex,
    stats: AllocationStats,
}

impl State {
    fn new(total_size: usize) -> Result<Self, AllocError> {
        let ledger = ChunkLedger::new(total_size);
        let mut free = FreeIndex::new();
        for (id, _) in ledger.iter() {
            free.insert(ledger.key(id)?);
        }
        Ok(Self {
            ledger,
            free,
            stats: AllocationStats::default(),
        })
    }

    /// Carves `size` bytes out of the best-fitting free chunk.
    ///
    /// Returns the chunk, its offset and its new generation.
    fn allocate(&mut self, size: usize) -> Result<(ChunkId, usize, u32), AllocError> {
        let Some(key) = self.free.find_best_fit(size) else {
            self.stats.record_oom();
            let largest_free = self.free.largest().map_or(0, |k| k.size());
            tracing::warn!(
                "best-fit: no free chunk for {size} bytes (largest {largest_free}, {} free chunks)",
                self.free.count()
            );
            return Err(AllocError::OutOfMemory {
                requested: size,
                largest_free,
            });
        };

        self.free.remove(&key);
        let id = key.id();
        if key.size() == size {
            self.stats.record_exact_fit(size);
        } else {
            let (_, back) = self.ledger.split(id, size)?;
            self.free.insert(self.ledger.key(back)?);
            self.stats.record_split(size);
            tracing::debug!(
                "best-fit: split {} bytes at offset {} into {size} + {}",
                key.size(),
                key.offset(),
                key.size() - size
            );
        }
        let generation = self.ledger.mark_allocated(id)?;
        Ok((id, key.offset(), generation))
    }

    /// Looks up the chunk behind a ticket, if the ticket is still live.
    fn live_chunk(&self, ticket: &Ticket, size: usize) -> Result<ChunkId, AllocError> {
        let id = ChunkId::from_index(ticket.slot());
        let chunk = self
            .ledger
            .get(id)
            .filter(|_| self.ledger.generation(id) == Some(ticket.generation()))
            .ok_or_else(|| {
                AllocError::InvalidHandle(format!("allocation {ticket} is no longer live"))
            })?;
        if chunk.is_free() {
            return Err(AllocError::InvalidHandle(format!(
                "allocation {ticket} was already released"
            )));
        }
        if chunk.size() != size {
            return Err(AllocError::InvalidHandle(format!(
                "allocation {ticket} is {} bytes, release claims {size}",
                chunk.size()
            )));
        }
        Ok(id)
    }

    /// Frees a chunk and coalesces it with free neighbours.
    fn release(&mut self, id: ChunkId) -> Result<(), AllocError> {
        let size = self.ledger.key(id)?.size();
        self.ledger.mark_free(id)?;

        let mut current = id;
        if let Some(prev) = self.ledger.prev(current) {
            if self.ledger.get(prev).is_some_and(|c| c.is_free()) {
                self.free.remove(&self.ledger.key(prev)?);
                current = self.ledger.merge(prev, current)?;
                self.stats.record_merge();
            }
        }
        if let Some(next) = self.ledger.next(current) {
            if self.ledger.get(next).is_some_and(|c| c.is_free()) {
                self.free.remove(&self.ledger.key(next)?);
                current = self.ledger.merge(current, next)?;
                self.stats.record_merge();
            }
        }

        let merged = self.ledger.key(current)?;
        if merged.size() != size {
            tracing::debug!(
                "best-fit: coalesced {size} bytes into {} at offset {}",
                merged.size(),
                merged.offset()
            );
        }
        self.free.insert(merged);
        self.stats.record_release(size);
        Ok(())
    }

    fn validate(&self) -> Result<(), AllocError> {
        self.ledger.validate()?;

        let mut free_chunks = 0;
        for (id, chunk) in self.ledger.iter() {
            if chunk.is_free() {
                free_chunks += 1;
                if !self.free.contains(&self.ledger.key(id)?) {
                    return Err(AllocError::Corrupted(format!(
                        "free chunk at offset {} is missing from the free index",
                        chunk.offset()
                    )));
                }
            }
        }
        if free_chunks != self.free.count() {
            return Err(AllocError::Corrupted(format!(
                "free index holds {} entries, ledger has {free_chunks} free chunks",
                self.free.count()
            )));
        }

        let allocated: usize = self
            .ledger
            .iter()
            .filter(|(_, c)| !c.is_free())
            .map(|(_, c)| c.size())
            .sum();
        if allocated != self.stats.allocated_bytes {
            return Err(AllocError::Corrupted(format!(
                "{allocated} bytes allocated in the ledger, {} accounted",
                self.stats.allocated_bytes
            )));
        }
        Ok(())
    }
}

/// Best-fit allocator over a single region obtained from a leaf `L`.
///
/// The region is returned to its leaf when the allocator is dropped. Every
/// [`Allocation`] handed out borrows the allocator, so none can outlive it.
///
/// # Example
/// ```
/// use alloc_core::{AllocatorExt, Strategy};
/// use best_fit::BestFitAllocator;
/// use leaf_memory::HostAllocator;
///
/// let leaf = HostAllocator::new();
/// let region = leaf.allocate(1024, Strategy::Default).unwrap();
/// let alloc = BestFitAllocator::new(region).unwrap();
///
/// let a = alloc.allocate(100, Strategy::Default).unwrap();
/// let b = alloc.allocate(200, Strategy::Default).unwrap();
/// assert_eq!(b.ptr() as usize - a.ptr() as usize, 100);
///
/// drop(a);
/// drop(b);
/// assert_eq!(alloc.num_free_chunks_now(), 1);
/// ```
pub struct BestFitAllocator<'a, L: Allocator + ?Sized> {
    id: AllocatorId,
    region: Allocation<'a, L>,
    state: RefCell<State>,
}

impl<'a, L: Allocator + ?Sized> BestFitAllocator<'a, L> {
    /// Takes ownership of `region` and manages it as one free chunk.
    pub fn new(region: Allocation<'a, L>) -> Result<Self, AllocError> {
        if region.size() == 0 {
            return Err(AllocError::InvalidRequest("cannot manage a zero-sized region".into()));
        }
        let state = State::new(region.size())?;
        let id = AllocatorId::next();
        tracing::info!(
            "best-fit #{} managing {:.2} MB on {}",
            id.get(),
            region.size() as f64 / (1024.0 * 1024.0),
            region.place()
        );
        Ok(Self {
            id,
            region,
            state: RefCell::new(state),
        })
    }

    pub fn id(&self) -> AllocatorId {
        self.id
    }

    /// Size of the managed region.
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Placement of the managed region, copied onto every allocation.
    pub fn place(&self) -> Place {
        self.region.place()
    }

    /// Same as [`Allocator::num_free_chunks`], without importing the trait.
    pub fn num_free_chunks_now(&self) -> usize {
        self.state.borrow().free.count()
    }

    /// Size of the largest free chunk: the largest request that can succeed.
    pub fn largest_free_chunk(&self) -> usize {
        self.state.borrow().free.largest().map_or(0, |k| k.size())
    }

    pub fn free_bytes(&self) -> usize {
        self.state.borrow().free.free_bytes()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.state.borrow().stats.allocated_bytes
    }

    pub fn stats(&self) -> AllocationStats {
        self.state.borrow().stats.clone()
    }

    /// The partition, in offset order.
    pub fn chunks(&self) -> Vec<ChunkView> {
        self.state
            .borrow()
            .ledger
            .iter()
            .map(|(_, c)| ChunkView {
                offset: c.offset(),
                size: c.size(),
                is_free: c.is_free(),
            })
            .collect()
    }

    /// The chunk currently backing `ticket`, if it is still live.
    pub fn chunk_of(&self, ticket: &Ticket) -> Option<ChunkView> {
        if ticket.owner() != self.id {
            return None;
        }
        let state = self.state.borrow();
        let id = ChunkId::from_index(ticket.slot());
        if state.ledger.generation(id) != Some(ticket.generation()) {
            return None;
        }
        state.ledger.get(id).map(|c| ChunkView {
            offset: c.offset(),
            size: c.size(),
            is_free: c.is_free(),
        })
    }

    /// Checks every structural invariant of the ledger and the free index.
    pub fn validate(&self) -> Result<(), AllocError> {
        let state = self.state.borrow();
        if state.ledger.total_size() != self.capacity() {
            return Err(AllocError::Corrupted(format!(
                "ledger spans {} bytes, region is {}",
                state.ledger.total_size(),
                self.capacity()
            )));
        }
        state.validate()
    }

    fn resolve(&self, offset: usize) -> Option<NonNull<u8>> {
        // `offset` lies inside the region, so the sum stays in bounds.
        self.region
            .as_non_null()
            .map(|base| unsafe { base.add(offset) })
    }
}

impl<L: Allocator + ?Sized> Allocator for BestFitAllocator<'_, L> {
    fn allocate_raw(&self, size: usize, strategy: Strategy) -> Result<RawAllocation, AllocError> {
        if strategy != Strategy::Default {
            return Err(AllocError::InvalidRequest(format!(
                "best-fit does not support strategy '{strategy}'"
            )));
        }
        if size == 0 {
            return Err(AllocError::InvalidRequest("cannot allocate zero bytes".into()));
        }

        let (chunk, offset, generation) = self.state.borrow_mut().allocate(size)?;
        tracing::trace!("best-fit #{}: {size} bytes at offset {offset}", self.id.get());

        let ticket = Ticket::new(self.id, chunk.index(), generation);
        // The chunk is marked allocated until this ticket comes back.
        Ok(unsafe { RawAllocation::new(self.resolve(offset), size, self.place(), ticket) })
    }

    fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError> {
        let ticket = raw.ticket();
        if ticket.owner() != self.id {
            return Err(AllocError::InvalidHandle(format!(
                "allocation {ticket} belongs to another allocator"
            )));
        }

        let mut state = self.state.borrow_mut();
        let id = state.live_chunk(&ticket, raw.size())?;
        state.release(id)?;
        tracing::trace!("best-fit #{}: released {}", self.id.get(), ticket);
        Ok(())
    }

    fn num_free_chunks(&self) -> usize {
        self.num_free_chunks_now()
    }
}

impl<L: Allocator + ?Sized> std::fmt::Debug for BestFitAllocator<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestFitAllocator")
            .field("id", &self.id.get())
            .field("capacity", &self.capacity())
            .field("place", &self.place())
            .field("free_chunks", &self.num_free_chunks_now())
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}
