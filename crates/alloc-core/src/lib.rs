// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # alloc-core
//!
//! The capability surface shared by every allocator in the workspace.
//!
//! # Key Components
//!
//! - [`Allocator`]: allocate / release / free-chunk count. Implemented by
//!   leaf providers, the best-fit sub-allocator and the lock decorator.
//! - [`Allocation`]: an RAII handle. When it is dropped, its range is
//!   returned to the allocator it borrows.
//! - [`RawAllocation`] and [`Ticket`]: the plain record behind a handle.
//! - [`Place`] and [`Strategy`]: placement tag and strategy selector.
//! - [`AllocError`]: the error taxonomy.
//!
//! # Ownership Model
//!
//! ```text
//! allocator.allocate(size, Strategy::Default)
//!       │
//!       ▼
//!   Allocation<'a, A>  ◄─── owns RawAllocation, borrows &'a A
//!       │
//!       │  drop()
//!       ▼
//!   A::release_raw(raw)
//! ```

mod allocation;
mod allocator;
mod error;
mod place;
mod strategy;

pub use allocation::{Allocation, AllocatorId, RawAllocation, Ticket};
pub use allocator::{Allocator, AllocatorExt};
pub use error::AllocError;
pub use place::Place;
pub use strategy::Strategy;
