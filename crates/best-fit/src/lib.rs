// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # best-fit
//!
//! Best-fit sub-allocation of one fixed region, plus a lock decorator that
//! makes any allocator safe to share between threads.
//!
//! ```text
//!  LockedAllocator ──► BestFitAllocator ──► leaf (host / mmap / opaque)
//!                        │
//!                        ├── ChunkLedger   offset-ordered partition
//!                        └── FreeIndex     (size, offset) ordered free set
//! ```
//!
//! The region is requested from the leaf once, at construction, and
//! returned when the allocator is dropped. Requests are never forwarded to
//! the leaf afterwards: when no free chunk is large enough the request
//! fails with [`AllocError::OutOfMemory`](alloc_core::AllocError).

mod best_fit;
mod free_index;
mod ledger;
mod locked;
mod stats;

pub use best_fit::{BestFitAllocator, ChunkView};
pub use free_index::{FreeIndex, FreeKey};
pub use ledger::{Chunk, ChunkId, ChunkLedger};
pub use locked::LockedAllocator;
pub use stats::AllocationStats;
