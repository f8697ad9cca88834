// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Mutual-exclusion decorator for any allocator.

use alloc_core::{AllocError, Allocator, RawAllocation, Strategy};
use std::sync::{Mutex, MutexGuard};

/// Serialises every operation on the wrapped allocator behind one lock.
///
/// `LockedAllocator<A>` is `Sync` whenever `A` is `Send`, so a single
/// [`BestFitAllocator`](crate::BestFitAllocator) can be shared by many
/// threads through a plain reference.
///
/// A poisoned lock is reported as [`AllocError::Corrupted`]: a panic while
/// the inner allocator was mid-update may have left it inconsistent.
pub struct LockedAllocator<A> {
    inner: Mutex<A>,
}

impl<A> LockedAllocator<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, A>, AllocError> {
        self.inner.lock().map_err(|_| {
            tracing::error!("locked allocator: lock poisoned");
            AllocError::Corrupted("allocator lock poisoned by a panicking thread".into())
        })
    }

    /// Runs `f` with exclusive access to the inner allocator.
    pub fn with_locked<R>(&self, f: impl FnOnce(&A) -> R) -> Result<R, AllocError> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    pub fn into_inner(self) -> Result<A, AllocError> {
        self.inner
            .into_inner()
            .map_err(|_| AllocError::Corrupted("allocator lock poisoned by a panicking thread".into()))
    }
}

impl<A: Allocator> Allocator for LockedAllocator<A> {
    fn allocate_raw(&self, size: usize, strategy: Strategy) -> Result<RawAllocation, AllocError> {
        self.lock()?.allocate_raw(size, strategy)
    }

    fn release_raw(&self, raw: RawAllocation) -> Result<(), AllocError> {
        self.lock()?.release_raw(raw)
    }

    fn num_free_chunks(&self) -> usize {
        match self.lock() {
            Ok(inner) => inner.num_free_chunks(),
            Err(e) => {
                tracing::error!("locked allocator: cannot count free chunks: {e}");
                0
            }
        }
    }
}

impl<A> std::fmt::Debug for LockedAllocator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedAllocator")
            .field("poisoned", &self.inner.is_poisoned())
            .finish_non_exhaustive()
    }
}
