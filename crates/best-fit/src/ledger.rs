// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The chunk ledger: an ordered partition of `[0, total_size)`.
//!
//! Chunks live in an arena of slots addressed by [`ChunkId`] and are
//! doubly linked in ascending offset order, which gives O(1) access to a
//! chunk's neighbours when coalescing. Slots freed by a merge are
//! recycled by later splits.
//!
//! Every slot carries a generation counter. It is bumped whenever the
//! slot's chunk becomes allocated and whenever the slot is vacated, so a
//! `(slot, generation)` pair taken at allocation time stops matching as
//! soon as that allocation is gone.

use crate::free_index::FreeKey;
use alloc_core::AllocError;

/// Stable identity of a chunk within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(usize);

impl ChunkId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A contiguous sub-range of the managed region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    offset: usize,
    size: usize,
    is_free: bool,
    prev: Option<ChunkId>,
    next: Option<ChunkId>,
}

impl Chunk {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// One past the last byte.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    pub fn is_free(&self) -> bool {
        self.is_free
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    chunk: Option<Chunk>,
}

/// Ordered, gap-free partition of a byte range into chunks.
#[derive(Debug)]
pub struct ChunkLedger {
    slots: Vec<Slot>,
    vacant: Vec<usize>,
    head: Option<ChunkId>,
    total_size: usize,
    len: usize,
}

impl ChunkLedger {
    /// Creates a ledger holding one free chunk spanning `[0, total_size)`.
    pub fn new(total_size: usize) -> Self {
        let mut ledger = Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            head: None,
            total_size: 0,
            len: 0,
        };
        ledger.initialize(total_size);
        ledger
    }

    /// Resets to a single free chunk `[0, total_size)`.
    ///
    /// Generations survive the reset so that tickets issued before it
    /// cannot match chunks created after it.
    pub fn initialize(&mut self, total_size: usize) {
        self.vacant.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.chunk.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.vacant.push(index);
        }
        // Pop from the back, so reuse starts at slot 0.
        self.vacant.reverse();

        self.total_size = total_size;
        self.len = 0;
        self.head = None;
        if total_size > 0 {
            let id = self.occupy(Chunk {
                offset: 0,
                size: total_size,
                is_free: true,
                prev: None,
                next: None,
            });
            self.head = Some(id);
        }
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Number of chunks in the partition.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.slots.get(id.0).and_then(|s| s.chunk.as_ref())
    }

    /// Current generation of the slot behind `id`.
    pub fn generation(&self, id: ChunkId) -> Option<u32> {
        self.slots.get(id.0).map(|s| s.generation)
    }

    pub fn prev(&self, id: ChunkId) -> Option<ChunkId> {
        self.get(id).and_then(|c| c.prev)
    }

    pub fn next(&self, id: ChunkId) -> Option<ChunkId> {
        self.get(id).and_then(|c| c.next)
    }

    /// The free-index key of a chunk.
    pub fn key(&self, id: ChunkId) -> Result<FreeKey, AllocError> {
        let chunk = self.chunk(id)?;
        Ok(FreeKey::new(chunk.size, chunk.offset, id))
    }

    /// Marks a free chunk allocated and returns the slot's new generation.
    pub fn mark_allocated(&mut self, id: ChunkId) -> Result<u32, AllocError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or_else(|| missing(id))?;
        let chunk = slot.chunk.as_mut().ok_or_else(|| missing(id))?;
        if !chunk.is_free {
            return Err(AllocError::Corrupted(format!("chunk {} is already allocated", id.0)));
        }
        chunk.is_free = false;
        slot.generation = slot.generation.wrapping_add(1);
        Ok(slot.generation)
    }

    /// Marks an allocated chunk free.
    pub fn mark_free(&mut self, id: ChunkId) -> Result<(), AllocError> {
        let chunk = self.chunk_mut(id)?;
        if chunk.is_free {
            return Err(AllocError::Corrupted(format!("chunk {} is already free", id.0)));
        }
        chunk.is_free = true;
        Ok(())
    }

    /// Splits a chunk of size `S` into `[offset, offset+at_size)` and
    /// `[offset+at_size, offset+S)`, both carrying the original free flag.
    ///
    /// The front part keeps the original identity; the back part gets a
    /// fresh one. Requires `0 < at_size < S`.
    pub fn split(&mut self, id: ChunkId, at_size: usize) -> Result<(ChunkId, ChunkId), AllocError> {
        let chunk = self.chunk(id)?.clone();
        if at_size == 0 || at_size >= chunk.size {
            return Err(AllocError::Corrupted(format!(
                "cannot split chunk {} of {} bytes at {at_size}",
                id.0, chunk.size
            )));
        }

        let back = self.occupy(Chunk {
            offset: chunk.offset + at_size,
            size: chunk.size - at_size,
            is_free: chunk.is_free,
            prev: Some(id),
            next: chunk.next,
        });
        if let Some(next) = chunk.next {
            self.chunk_mut(next)?.prev = Some(back);
        }
        let front = self.chunk_mut(id)?;
        front.size = at_size;
        front.next = Some(back);

        Ok((id, back))
    }

    /// Merges `b` into the chunk `a` that directly precedes it.
    ///
    /// Both must be free. `a` keeps its identity and `b`'s slot is vacated.
    pub fn merge(&mut self, a: ChunkId, b: ChunkId) -> Result<ChunkId, AllocError> {
        let first = self.chunk(a)?;
        let second = self.chunk(b)?;
        if first.next != Some(b) || second.prev != Some(a) {
            return Err(AllocError::Corrupted(format!(
                "chunks {} and {} are not adjacent",
                a.0, b.0
            )));
        }
        if !first.is_free || !second.is_free {
            return Err(AllocError::Corrupted(format!(
                "cannot merge chunks {} and {}: both must be free",
                a.0, b.0
            )));
        }

        let (size, next) = (second.size, second.next);
        self.vacate(b);
        if let Some(next) = next {
            self.chunk_mut(next)?.prev = Some(a);
        }
        let merged = self.chunk_mut(a)?;
        merged.size += size;
        merged.next = next;
        Ok(a)
    }

    /// Iterates chunks in ascending offset order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            ledger: self,
            cursor: self.head,
        }
    }

    /// Checks coverage, link consistency and the no-adjacent-free rule.
    pub fn validate(&self) -> Result<(), AllocError> {
        let mut expected_offset = 0;
        let mut prev: Option<(ChunkId, bool)> = None;
        let mut count = 0;

        for (id, chunk) in self.iter() {
            count += 1;
            if count > self.len {
                return Err(AllocError::Corrupted("chunk list contains a cycle".into()));
            }
            if chunk.size == 0 {
                return Err(AllocError::Corrupted(format!("chunk {} is empty", id.0)));
            }
            if chunk.offset != expected_offset {
                return Err(AllocError::Corrupted(format!(
                    "chunk {} starts at {}, expected {expected_offset}",
                    id.0, chunk.offset
                )));
            }
            if chunk.prev != prev.map(|(p, _)| p) {
                return Err(AllocError::Corrupted(format!(
                    "chunk {} has a stale back link",
                    id.0
                )));
            }
            if let Some((p, true)) = prev {
                if chunk.is_free {
                    return Err(AllocError::Corrupted(format!(
                        "free chunks {} and {} are adjacent",
                        p.0, id.0
                    )));
                }
            }
            expected_offset = chunk.end();
            prev = Some((id, chunk.is_free));
        }

        if expected_offset != self.total_size {
            return Err(AllocError::Corrupted(format!(
                "chunks cover {expected_offset} of {} bytes",
                self.total_size
            )));
        }
        if count != self.len {
            return Err(AllocError::Corrupted(format!(
                "{count} chunks reachable, {} recorded",
                self.len
            )));
        }
        Ok(())
    }

    fn chunk(&self, id: ChunkId) -> Result<&Chunk, AllocError> {
        self.get(id).ok_or_else(|| missing(id))
    }

    fn chunk_mut(&mut self, id: ChunkId) -> Result<&mut Chunk, AllocError> {
        self.slots
            .get_mut(id.0)
            .and_then(|s| s.chunk.as_mut())
            .ok_or_else(|| missing(id))
    }

    fn occupy(&mut self, chunk: Chunk) -> ChunkId {
        self.len += 1;
        match self.vacant.pop() {
            Some(index) => {
                self.slots[index].chunk = Some(chunk);
                ChunkId(index)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    chunk: Some(chunk),
                });
                ChunkId(self.slots.len() - 1)
            }
        }
    }

    fn vacate(&mut self, id: ChunkId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            if slot.chunk.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.vacant.push(id.0);
                self.len -= 1;
            }
        }
    }
}

fn missing(id: ChunkId) -> AllocError {
    AllocError::Corrupted(format!("chunk {} does not exist", id.0))
}

/// Iterator over a ledger's chunks in offset order.
pub struct Iter<'a> {
    ledger: &'a ChunkLedger,
    cursor: Option<ChunkId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (ChunkId, &'a Chunk);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let chunk = self.ledger.get(id)?;
        self.cursor = chunk.next;
        Some((id, chunk))
    }
}
