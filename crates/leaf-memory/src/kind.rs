// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Leaf selection by name, for configuration files and the CLI.

use crate::{HostAllocator, MmapAllocator, OpaqueAllocator};
use alloc_core::{AllocError, Allocator};
use std::fmt;
use std::str::FromStr;

/// Which leaf provider backs a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafKind {
    /// Process heap ([`HostAllocator`]).
    #[default]
    Host,
    /// Anonymous mappings ([`MmapAllocator`]).
    Mmap,
    /// Pointer-less device regions ([`OpaqueAllocator`]).
    Opaque,
}

impl LeafKind {
    pub fn name(&self) -> &'static str {
        match self {
            LeafKind::Host => "host",
            LeafKind::Mmap => "mmap",
            LeafKind::Opaque => "opaque",
        }
    }

    /// `true` if regions from this leaf can be read and written by the host.
    pub fn is_addressable(&self) -> bool {
        !matches!(self, LeafKind::Opaque)
    }

    /// Builds the leaf. `device` is only used by [`LeafKind::Opaque`].
    pub fn build(&self, device: u32) -> Box<dyn Allocator + Send + Sync> {
        match self {
            LeafKind::Host => Box::new(HostAllocator::new()),
            LeafKind::Mmap => Box::new(MmapAllocator::new()),
            LeafKind::Opaque => Box::new(OpaqueAllocator::new(device)),
        }
    }
}

impl FromStr for LeafKind {
    type Err = AllocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "host" | "heap" | "cpu" => Ok(LeafKind::Host),
            "mmap" => Ok(LeafKind::Mmap),
            "opaque" | "device" => Ok(LeafKind::Opaque),
            other => Err(AllocError::InvalidRequest(format!(
                "unknown leaf '{other}'; expected 'host', 'mmap', or 'opaque'"
            ))),
        }
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc_core::{AllocatorExt, Place, Strategy};

    #[test]
    fn test_parse() {
        assert_eq!("host".parse::<LeafKind>().unwrap(), LeafKind::Host);
        assert_eq!("CPU".parse::<LeafKind>().unwrap(), LeafKind::Host);
        assert_eq!("mmap".parse::<LeafKind>().unwrap(), LeafKind::Mmap);
        assert_eq!("device".parse::<LeafKind>().unwrap(), LeafKind::Opaque);
        assert!("gpu-direct".parse::<LeafKind>().is_err());
    }

    #[test]
    fn test_build_each_kind() {
        for kind in [LeafKind::Host, LeafKind::Mmap, LeafKind::Opaque] {
            let leaf = kind.build(3);
            let region = leaf.allocate(4096, Strategy::Default).unwrap();
            assert_eq!(region.size(), 4096);
            assert_eq!(region.ptr().is_null(), !kind.is_addressable());
            if kind == LeafKind::Opaque {
                assert_eq!(region.place(), Place::Device(3));
            }
        }
    }

    #[test]
    fn test_display_roundtrip() {
        for kind in [LeafKind::Host, LeafKind::Mmap, LeafKind::Opaque] {
            assert_eq!(kind.to_string().parse::<LeafKind>().unwrap(), kind);
        }
    }
}
