// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`Allocator`] capability shared by leaves, sub-allocators and
//! decorators.

use crate::{AllocError, Allocation, RawAllocation, Strategy};

/// Trait for anything that hands out regions of memory.
///
/// Leaf providers satisfy requests directly; sub-allocators carve requests
/// out of a region obtained from a leaf; decorators delegate to a wrapped
/// allocator. All of them expose this same surface, so they compose
/// freely.
///
/// The trait is dyn-compatible. Callers normally go through
/// [`AllocatorExt::allocate`], which wraps the raw record in an
/// [`Allocation`] that releases itself on drop.
pub trait Allocator {
    /// Reserves `size` bytes and returns the raw record describing them.
    fn allocate_raw(&self, size: usize, strategy: Strategy) -> Result<RawAllocation, AllocError>;

    /// Returns a region previously produced by [`Allocator::allocate_raw`].
    ///
    /// Releasing a record this allocator does not currently own yields
    /// [`AllocError::InvalidHandle`] and leaves the allocator untouched.
    fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError>;

    /// Number of free chunks currently tracked. Purely diagnostic.
    ///
    /// Leaf providers do not subdivide their memory and report zero.
    fn num_free_chunks(&self) -> usize {
        0
    }
}

/// Handle-producing helpers available on every [`Allocator`].
pub trait AllocatorExt: Allocator {
    /// Allocates `size` bytes and wraps them in an RAII [`Allocation`].
    ///
    /// The handle borrows `self`, so the allocator provably outlives it.
    fn allocate(&self, size: usize, strategy: Strategy) -> Result<Allocation<'_, Self>, AllocError> {
        let raw = self.allocate_raw(size, strategy)?;
        // Fresh from `self`, so it is live and owned by `self`.
        Ok(unsafe { Allocation::from_raw(self, raw) })
    }
}

impl<A: Allocator + ?Sized> AllocatorExt for A {}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn allocate_raw(&self, size: usize, strategy: Strategy) -> Result<RawAllocation, AllocError> {
        (**self).allocate_raw(size, strategy)
    }

    fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError> {
        (**self).release_raw(raw)
    }

    fn num_free_chunks(&self) -> usize {
        (**self).num_free_chunks()
    }
}
