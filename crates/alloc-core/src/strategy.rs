// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation strategy selector.

use crate::AllocError;
use std::fmt;
use std::str::FromStr;

/// Selects how an allocator should satisfy a request.
///
/// Only [`Strategy::Default`] is recognised today. The selector travels
/// through every layer so that new strategies can be added without
/// changing the capability surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Strategy {
    #[default]
    Default,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Default => "default",
        }
    }
}

impl FromStr for Strategy {
    type Err = AllocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Strategy::Default),
            other => Err(AllocError::InvalidRequest(format!(
                "unknown strategy '{other}'; expected 'default'"
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
