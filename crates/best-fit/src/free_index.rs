// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Size-ordered index over the free chunks.
//!
//! Entries are ordered by `(size, offset, id)`, so the first entry at or
//! after `(min_size, 0, 0)` is the smallest free chunk that fits, with
//! ties going to the lowest offset. Lookups, inserts and removals are all
//! O(log n).

use crate::ledger::ChunkId;
use std::collections::BTreeSet;

/// Key of one free chunk in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FreeKey {
    size: usize,
    offset: usize,
    id: ChunkId,
}

impl FreeKey {
    pub fn new(size: usize, offset: usize, id: ChunkId) -> Self {
        Self { size, offset, id }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }
}

/// The set of currently-free chunks, searchable by size.
#[derive(Debug, Default)]
pub struct FreeIndex {
    entries: BTreeSet<FreeKey>,
}

impl FreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a free chunk. Returns `false` if it was already present.
    pub fn insert(&mut self, key: FreeKey) -> bool {
        self.entries.insert(key)
    }

    /// Drops a chunk from the free set. Returns `false` if it was absent.
    pub fn remove(&mut self, key: &FreeKey) -> bool {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &FreeKey) -> bool {
        self.entries.contains(key)
    }

    /// Smallest free chunk with `size >= min_size`, lowest offset first.
    pub fn find_best_fit(&self, min_size: usize) -> Option<FreeKey> {
        let floor = FreeKey::new(min_size, 0, ChunkId::from_index(0));
        self.entries.range(floor..).next().copied()
    }

    /// The largest free chunk, if any.
    pub fn largest(&self) -> Option<FreeKey> {
        self.entries.last().copied()
    }

    /// Number of free chunks indexed.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Total free bytes.
    pub fn free_bytes(&self) -> usize {
        self.entries.iter().map(|k| k.size).sum()
    }
}
