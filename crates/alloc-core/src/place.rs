// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Placement tags attached to every region.

use std::fmt;

/// Where the bytes of a region physically live.
///
/// The tag is opaque to the sub-allocators: it is taken from the leaf
/// region and copied onto every allocation carved out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Place {
    /// Host memory, directly addressable by the CPU.
    #[default]
    Host,
    /// Memory on an accelerator, identified by its ordinal.
    Device(u32),
}

impl Place {
    /// Returns `true` if regions at this place have a host pointer.
    pub fn is_host(&self) -> bool {
        matches!(self, Place::Host)
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Host => write!(f, "host"),
            Place::Device(ordinal) => write!(f, "device:{ordinal}"),
        }
    }
}
