// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Region size configuration and parsing.
//!
//! A [`RegionSize`] is the byte count of the single reservation a
//! sub-allocator asks its leaf for. It supports human-readable string
//! parsing for config files and the command line.

use alloc_core::AllocError;
use std::fmt;

const KB: usize = 1024;
const MB: usize = 1024 * 1024;
const GB: usize = 1024 * 1024 * 1024;

/// Byte size of a leaf reservation.
///
/// # Parsing
/// Supports human-readable strings with binary suffixes:
/// - `"512M"` or `"512MB"` → 512 × 1024² bytes
/// - `"4G"` or `"4GB"` → 4 × 1024³ bytes
/// - `"2048K"` or `"2048KB"` → 2048 × 1024 bytes
/// - `"1073741824"` → raw byte count
///
/// # Examples
/// ```
/// use leaf_memory::RegionSize;
///
/// let s = RegionSize::from_mb(256);
/// assert_eq!(s.as_mb(), 256);
///
/// let s = RegionSize::parse("4G").unwrap();
/// assert_eq!(s.as_mb(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct RegionSize {
    bytes: usize,
}

impl RegionSize {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KB }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MB }
    }

    pub fn from_gb(gb: usize) -> Self {
        Self { bytes: gb * GB }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Size in megabytes (truncated).
    pub fn as_mb(&self) -> usize {
        self.bytes / MB
    }

    /// Parses a human-readable size string. Case-insensitive.
    ///
    /// A zero size is rejected: no region can be carved out of it.
    pub fn parse(s: &str) -> Result<Self, AllocError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AllocError::InvalidRequest("empty region size".into()));
        }

        let upper = s.to_uppercase();
        let (digits, multiplier) = [
            ("GB", GB),
            ("G", GB),
            ("MB", MB),
            ("M", MB),
            ("KB", KB),
            ("K", KB),
            ("B", 1),
        ]
        .iter()
        .find(|(suffix, _)| upper.ends_with(suffix))
        .map(|&(suffix, mult)| (&s[..s.len() - suffix.len()], mult))
        .unwrap_or((s, 1));

        let value: usize = digits.trim().parse().map_err(|_| {
            AllocError::InvalidRequest(format!(
                "invalid region size '{s}': expected a number followed by an optional suffix (K, M, G)"
            ))
        })?;

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| AllocError::InvalidRequest(format!("region size overflow: '{s}'")))?;

        if bytes == 0 {
            return Err(AllocError::InvalidRequest(format!("region size '{s}' is zero")));
        }

        Ok(Self { bytes })
    }
}

impl fmt::Display for RegionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= GB && self.bytes % GB == 0 {
            write!(f, "{} GB", self.bytes / GB)
        } else if self.bytes >= MB && self.bytes % MB == 0 {
            write!(f, "{} MB", self.bytes / MB)
        } else if self.bytes >= KB && self.bytes % KB == 0 {
            write!(f, "{} KB", self.bytes / KB)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}
