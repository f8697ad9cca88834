// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation records and the RAII handle that returns them.
//!
//! [`RawAllocation`] is the plain description of a reserved range: where
//! it starts, how long it is, where it lives, and a [`Ticket`] naming the
//! chunk that backs it. [`Allocation`] pairs a raw record with a borrow of
//! the allocator that produced it and gives the range back when dropped.
//! Because the handle borrows its allocator, the borrow checker rejects
//! any attempt to drop an allocator while handles are outstanding.

use crate::{AllocError, Allocator, Place};
use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an allocator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocatorId(u64);

impl AllocatorId {
    /// Draws a fresh id. Ids are never reused within a process.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Names the chunk backing an allocation.
///
/// `slot` and `generation` are allocator-defined. A sub-allocator bumps
/// the generation of a slot whenever the slot changes hands, so a ticket
/// kept after its release never matches a live chunk again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    owner: AllocatorId,
    slot: usize,
    generation: u32,
}

impl Ticket {
    pub fn new(owner: AllocatorId, slot: usize, generation: u32) -> Self {
        Self {
            owner,
            slot,
            generation,
        }
    }

    pub fn owner(&self) -> AllocatorId {
        self.owner
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}/{}@{}", self.owner.0, self.slot, self.generation)
    }
}

/// A reserved range, without any automatic release.
///
/// Move-only: there is exactly one record per live reservation.
pub struct RawAllocation {
    ptr: Option<NonNull<u8>>,
    size: usize,
    place: Place,
    ticket: Ticket,
}

// The record only describes memory; whoever holds it holds the range.
unsafe impl Send for RawAllocation {}

impl RawAllocation {
    /// Creates a record.
    ///
    /// # Safety
    /// When `ptr` is `Some`, it must point to `size` initialised bytes
    /// that stay valid, and are reserved for this record alone, until the
    /// record is handed back to the allocator named by `ticket`.
    pub unsafe fn new(ptr: Option<NonNull<u8>>, size: usize, place: Place, ticket: Ticket) -> Self {
        Self {
            ptr,
            size,
            place,
            ticket,
        }
    }

    /// Start of the range, or `None` for regions without a host pointer.
    pub fn ptr(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl fmt::Debug for RawAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAllocation")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("place", &self.place)
            .field("ticket", &self.ticket)
            .finish()
    }
}

/// An RAII handle over a reserved range.
///
/// When an `Allocation` is dropped, its range is returned to the allocator
/// that produced it. Use [`Allocation::release`] instead of dropping when
/// the caller wants to observe a release failure.
///
/// # Example
/// ```
/// use alloc_core::{AllocError, Allocator, AllocatorExt, AllocatorId, Place, RawAllocation, Strategy, Ticket};
///
/// struct Null(AllocatorId);
///
/// impl Allocator for Null {
///     fn allocate_raw(&self, size: usize, _: Strategy) -> Result<RawAllocation, AllocError> {
///         // No pointer: nothing to vouch for.
///         Ok(unsafe { RawAllocation::new(None, size, Place::Device(0), Ticket::new(self.0, 0, 0)) })
///     }
///     fn release_raw(&self, _: RawAllocation) -> Result<(), AllocError> {
///         Ok(())
///     }
/// }
///
/// let null = Null(AllocatorId::next());
/// let a = null.allocate(64, Strategy::Default).unwrap();
/// assert_eq!(a.size(), 64);
/// assert!(a.ptr().is_null());
/// drop(a); // returned to `null`
/// ```
pub struct Allocation<'a, A: Allocator + ?Sized> {
    raw: ManuallyDrop<RawAllocation>,
    allocator: &'a A,
}

impl<'a, A: Allocator + ?Sized> Allocation<'a, A> {
    /// Wraps a raw record so that it is released to `allocator` on drop.
    ///
    /// # Safety
    /// `raw` must have been produced by `allocator` and not yet released.
    /// The handle exposes the range through safe slices.
    pub unsafe fn from_raw(allocator: &'a A, raw: RawAllocation) -> Self {
        Self {
            raw: ManuallyDrop::new(raw),
            allocator,
        }
    }

    /// Start of the range; null for regions without a host pointer.
    pub fn ptr(&self) -> *mut u8 {
        self.raw
            .ptr()
            .map_or(std::ptr::null_mut(), |p| p.as_ptr())
    }

    pub fn as_non_null(&self) -> Option<NonNull<u8>> {
        self.raw.ptr()
    }

    /// Size of the range in bytes.
    pub fn size(&self) -> usize {
        self.raw.size()
    }

    pub fn place(&self) -> Place {
        self.raw.place()
    }

    pub fn ticket(&self) -> Ticket {
        self.raw.ticket()
    }

    /// Immutable view of the range, if it is host-addressable.
    pub fn as_slice(&self) -> Option<&[u8]> {
        let size = self.raw.size();
        self.raw
            .ptr()
            .map(|p| unsafe { std::slice::from_raw_parts(p.as_ptr(), size) })
    }

    /// Mutable view of the range, if it is host-addressable.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        let size = self.raw.size();
        self.raw
            .ptr()
            .map(|p| unsafe { std::slice::from_raw_parts_mut(p.as_ptr(), size) })
    }

    /// Returns the range now and reports whether the allocator accepted it.
    pub fn release(self) -> Result<(), AllocError> {
        let allocator = self.allocator;
        let raw = self.into_raw();
        allocator.release_raw(raw)
    }

    /// Gives up automatic release and hands back the raw record.
    pub fn into_raw(self) -> RawAllocation {
        let mut this = ManuallyDrop::new(self);
        // `this` is never dropped, so the record is taken exactly once.
        unsafe { ManuallyDrop::take(&mut this.raw) }
    }
}

impl<A: Allocator + ?Sized> Drop for Allocation<'_, A> {
    fn drop(&mut self) {
        // Drop runs once and the field is not touched afterwards.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        let ticket = raw.ticket();
        if let Err(e) = self.allocator.release_raw(raw) {
            tracing::error!("failed to release allocation {ticket}: {e}");
        }
    }
}

impl<A: Allocator + ?Sized> fmt::Debug for Allocation<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("ptr", &self.ptr())
            .field("size", &self.size())
            .field("place", &self.place())
            .field("ticket", &self.ticket())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllocatorExt, Strategy};
    use std::cell::{Cell, RefCell};

    /// Hands out slices of a fixed buffer and records every release.
    struct Recording {
        id: AllocatorId,
        buffer: RefCell<Vec<u8>>,
        next: Cell<usize>,
        released: RefCell<Vec<Ticket>>,
    }

    impl Recording {
        fn new(len: usize) -> Self {
            Self {
                id: AllocatorId::next(),
                buffer: RefCell::new(vec![0; len]),
                next: Cell::new(0),
                released: RefCell::new(Vec::new()),
            }
        }
    }

    impl Allocator for Recording {
        fn allocate_raw(&self, size: usize, _: Strategy) -> Result<RawAllocation, AllocError> {
            let offset = self.next.get();
            let mut buffer = self.buffer.borrow_mut();
            if offset + size > buffer.len() {
                return Err(AllocError::OutOfMemory {
                    requested: size,
                    largest_free: buffer.len() - offset,
                });
            }
            self.next.set(offset + size);
            let ptr = NonNull::new(unsafe { buffer.as_mut_ptr().add(offset) });
            Ok(unsafe { RawAllocation::new(ptr, size, Place::Host, Ticket::new(self.id, offset, 0)) })
        }

        fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError> {
            if raw.ticket().owner() != self.id {
                return Err(AllocError::InvalidHandle(format!("foreign ticket {}", raw.ticket())));
            }
            self.released.borrow_mut().push(raw.ticket());
            Ok(())
        }
    }

    #[test]
    fn test_drop_releases() {
        let alloc = Recording::new(128);
        let a = alloc.allocate(16, Strategy::Default).unwrap();
        let ticket = a.ticket();
        assert!(alloc.released.borrow().is_empty());
        drop(a);
        assert_eq!(alloc.released.borrow().as_slice(), &[ticket]);
    }

    #[test]
    fn test_explicit_release() {
        let alloc = Recording::new(128);
        let a = alloc.allocate(16, Strategy::Default).unwrap();
        a.release().unwrap();
        assert_eq!(alloc.released.borrow().len(), 1);
    }

    #[test]
    fn test_into_raw_skips_release() {
        let alloc = Recording::new(128);
        let a = alloc.allocate(16, Strategy::Default).unwrap();
        let raw = a.into_raw();
        assert!(alloc.released.borrow().is_empty());

        let again = unsafe { Allocation::from_raw(&alloc, raw) };
        drop(again);
        assert_eq!(alloc.released.borrow().len(), 1);
    }

    #[test]
    fn test_foreign_release_is_rejected() {
        let a1 = Recording::new(64);
        let a2 = Recording::new(64);
        let raw = a1.allocate_raw(8, Strategy::Default).unwrap();
        let err = a2.release_raw(raw).unwrap_err();
        assert!(matches!(err, AllocError::InvalidHandle(_)));
    }

    #[test]
    fn test_slices() {
        let alloc = Recording::new(64);
        let mut a = alloc.allocate(8, Strategy::Default).unwrap();
        a.as_mut_slice().unwrap().copy_from_slice(&[7; 8]);
        assert_eq!(a.as_slice().unwrap(), &[7; 8]);
        assert!(!a.ptr().is_null());
        assert_eq!(a.place(), Place::Host);
    }

    #[test]
    fn test_ticket_display() {
        let id = AllocatorId::next();
        let t = Ticket::new(id, 3, 7);
        assert_eq!(t.to_string(), format!("#{}/3@7", id.get()));
    }

    #[test]
    fn test_allocator_ids_are_unique() {
        let a = AllocatorId::next();
        let b = AllocatorId::next();
        assert_ne!(a, b);
    }
}
