// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # leaf-memory
//!
//! Leaf providers: the allocators that own physical memory.
//!
//! A sub-allocator asks its leaf once for one large region and carves
//! everything else out of it. Leaves implement the same
//! [`Allocator`](alloc_core::Allocator) capability as the sub-allocators,
//! each call reserving one fresh region.
//!
//! # Key Components
//!
//! - [`HostAllocator`]: zero-initialised heap regions.
//! - [`MmapAllocator`]: anonymous mappings via `memmap2`.
//! - [`OpaqueAllocator`]: device regions without a host pointer.
//! - [`RegionSize`]: human-readable sizes (`"256M"`, `"4G"`).
//! - [`LeafKind`]: selects a leaf by name.
//! - [`LeafStats`]: live/peak usage counters.
//!
//! # Example
//! ```
//! use alloc_core::{AllocatorExt, Strategy};
//! use leaf_memory::{HostAllocator, RegionSize};
//!
//! let leaf = HostAllocator::new();
//! let size = RegionSize::parse("1M").unwrap();
//! let region = leaf.allocate(size.as_bytes(), Strategy::Default).unwrap();
//! assert_eq!(leaf.stats().live_bytes, 1024 * 1024);
//!
//! drop(region);
//! assert_eq!(leaf.stats().live_bytes, 0);
//! ```

mod host;
mod kind;
mod mmap;
mod opaque;
mod registry;
mod size;

pub use host::HostAllocator;
pub use kind::LeafKind;
pub use mmap::MmapAllocator;
pub use opaque::OpaqueAllocator;
pub use registry::LeafStats;
pub use size::RegionSize;
