// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocator stack configuration loaded from TOML files or the command line.
//!
//! # TOML Format
//! ```toml
//! region_size = "256M"
//! leaf = "host"
//! device = 0
//! thread_safe = true
//! strategy = "default"
//! ```

use alloc_core::{AllocError, Strategy};
use leaf_memory::{LeafKind, RegionSize};
use std::path::{Path, PathBuf};

/// Errors raised while loading or validating a [`StackConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialise error: {0}")]
    Serialise(#[from] toml::ser::Error),

    #[error("invalid {field}: {source}")]
    Invalid {
        field: &'static str,
        source: AllocError,
    },
}

/// Describes the leaf, region and decorators to build.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StackConfig {
    /// Size of the single leaf reservation (human-readable, e.g. `"256M"`).
    pub region_size: String,
    /// Leaf provider: `"host"`, `"mmap"` or `"opaque"`.
    pub leaf: String,
    /// Device ordinal, only used by opaque leaves.
    #[serde(default)]
    pub device: u32,
    /// Whether to wrap the best-fit allocator in a lock.
    #[serde(default = "default_true")]
    pub thread_safe: bool,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

fn default_true() -> bool {
    true
}

fn default_strategy() -> String {
    Strategy::Default.name().to_string()
}

impl StackConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn region_bytes(&self) -> Result<usize, ConfigError> {
        RegionSize::parse(&self.region_size)
            .map(|s| s.as_bytes())
            .map_err(|source| ConfigError::Invalid {
                field: "region_size",
                source,
            })
    }

    pub fn leaf_kind(&self) -> Result<LeafKind, ConfigError> {
        self.leaf.parse().map_err(|source| ConfigError::Invalid {
            field: "leaf",
            source,
        })
    }

    pub fn strategy(&self) -> Result<Strategy, ConfigError> {
        self.strategy.parse().map_err(|source| ConfigError::Invalid {
            field: "strategy",
            source,
        })
    }

    /// Checks that every field parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.region_bytes()?;
        self.leaf_kind()?;
        self.strategy()?;
        Ok(())
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            region_size: "256M".to_string(),
            leaf: LeafKind::Host.name().to_string(),
            device: 0,
            thread_safe: true,
            strategy: default_strategy(),
        }
    }
}
