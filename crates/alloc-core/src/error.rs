// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types shared by every allocator in the stack.

/// Errors that can occur while allocating or releasing a region.
///
/// Decorators pass these through unchanged, so the variant a caller sees
/// is the one the innermost allocator reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// No free chunk is large enough for the request.
    ///
    /// Recoverable: the caller may release other allocations and retry.
    #[error("out of memory: requested {requested} bytes, largest free chunk is {largest_free} bytes")]
    OutOfMemory {
        requested: usize,
        largest_free: usize,
    },

    /// The request itself is malformed (zero size, unknown strategy, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A release named an allocation this allocator does not currently own.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// The leaf provider could not supply or reclaim memory.
    #[error("backend error: {0}")]
    Backend(String),

    /// An internal inconsistency was detected.
    #[error("allocator integrity error: {0}")]
    Corrupted(String),
}

impl AllocError {
    /// Returns `true` for the out-of-capacity condition.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, AllocError::OutOfMemory { .. })
    }
}
