// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `region-rt trace` command: deterministic replay with layout dumps.

use crate::config::StackConfig;
use alloc_core::AllocatorExt;
use best_fit::{BestFitAllocator, ChunkView};
use std::str::FromStr;

/// One replayed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `a:SIZE`
    Allocate(usize),
    /// `f:N`, releasing the N-th allocation (1-based).
    Free(usize),
}

impl FromStr for Op {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("expected 'a:SIZE' or 'f:N', got '{s}'"))?;
        let n: usize = arg
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("bad number in '{s}': {e}"))?;
        match kind.trim() {
            "a" | "alloc" => Ok(Op::Allocate(n)),
            "f" | "free" if n >= 1 => Ok(Op::Free(n)),
            "f" | "free" => anyhow::bail!("allocations are numbered from 1, got '{s}'"),
            other => anyhow::bail!("unknown operation '{other}' in '{s}'"),
        }
    }
}

pub fn parse_ops(ops: &str) -> anyhow::Result<Vec<Op>> {
    ops.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Renders the partition as `[offset+size used|free]` cells.
pub fn render_layout(chunks: &[ChunkView]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "[{}+{} {}]",
                c.offset,
                c.size,
                if c.is_free { "free" } else { "used" }
            )
        })
        .collect::<Vec<_>>()
        .join("")
}

pub fn execute(config: &StackConfig, ops: &str, json: bool) -> anyhow::Result<()> {
    let ops = parse_ops(ops)?;
    let strategy = config.strategy()?;
    let leaf = config.leaf_kind()?.build(config.device);
    let allocator = BestFitAllocator::new(leaf.allocate(config.region_bytes()?, strategy)?)?;

    if !json {
        println!("  start      {}", render_layout(&allocator.chunks()));
    }

    // Slot `i` holds the (i+1)-th allocation until it is freed.
    let mut live = Vec::new();
    for op in ops {
        let label = match op {
            Op::Allocate(size) => match allocator.allocate(size, strategy) {
                Ok(handle) => {
                    let offset = allocator
                        .chunk_of(&handle.ticket())
                        .map_or(0, |c| c.offset);
                    live.push(Some(handle));
                    format!("a:{size} #{} @{offset}", live.len())
                }
                Err(e) if e.is_out_of_memory() => {
                    live.push(None);
                    format!("a:{size} #{} failed: {e}", live.len())
                }
                Err(e) => return Err(e.into()),
            },
            Op::Free(n) => {
                let handle = live
                    .get_mut(n - 1)
                    .and_then(Option::take)
                    .ok_or_else(|| anyhow::anyhow!("f:{n}: no live allocation #{n}"))?;
                handle.release()?;
                format!("f:{n}")
            }
        };
        if !json {
            println!("  {label:<10} {}", render_layout(&allocator.chunks()));
        }
    }

    allocator.validate()?;
    if json {
        let out = serde_json::json!({
            "capacity": allocator.capacity(),
            "free_chunks": allocator.num_free_chunks_now(),
            "largest_free": allocator.largest_free_chunk(),
            "chunks": allocator.chunks(),
            "stats": allocator.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!("  {}", allocator.stats().summary());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ops() {
        let ops = parse_ops("a:80, a:60,f:1,alloc:30,").unwrap();
        assert_eq!(
            ops,
            vec![Op::Allocate(80), Op::Allocate(60), Op::Free(1), Op::Allocate(30)]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_ops("a80").is_err());
        assert!(parse_ops("a:x").is_err());
        assert!(parse_ops("f:0").is_err());
        assert!(parse_ops("m:4").is_err());
    }

    #[test]
    fn test_render_layout() {
        let chunks = [
            ChunkView { offset: 0, size: 80, is_free: false },
            ChunkView { offset: 80, size: 20, is_free: true },
        ];
        assert_eq!(render_layout(&chunks), "[0+80 used][80+20 free]");
    }

    #[test]
    fn test_execute_reference_sequence() {
        let config = StackConfig {
            region_size: "1K".into(),
            leaf: "opaque".into(),
            ..Default::default()
        };
        execute(&config, "a:80,a:60,a:90,f:2,a:30,f:4,a:60", true).unwrap();
    }

    #[test]
    fn test_execute_rejects_double_free() {
        let config = StackConfig {
            region_size: "1K".into(),
            leaf: "opaque".into(),
            ..Default::default()
        };
        assert!(execute(&config, "a:80,f:1,f:1", false).is_err());
    }
}
