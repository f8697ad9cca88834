// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # region-rt
//!
//! Command-line harness for the best-fit region allocator.
//!
//! ## Usage
//! ```bash
//! # Hammer a locked allocator from many threads
//! region-rt stress --threads 1024 --iterations 128 --max-elements 1024
//!
//! # Replay a fixed sequence and watch the chunk layout
//! region-rt --leaf opaque --region-size 4G trace --ops "a:80,a:60,a:90,f:2,a:30"
//!
//! # Print the resolved configuration
//! region-rt --config stack.toml config
//! ```

mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::StackConfig;

#[derive(Parser)]
#[command(
    name = "region-rt",
    about = "Best-fit sub-allocation over a single leaf region",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (CLI overrides apply on top).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Region size (e.g., "256M", "4G").
    #[arg(long, global = true)]
    region_size: Option<String>,

    /// Leaf provider: host, mmap, opaque.
    #[arg(long, global = true)]
    leaf: Option<String>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate, write, verify and release from many threads at once.
    Stress {
        /// Number of worker threads.
        #[arg(short, long, default_value_t = 1024)]
        threads: usize,

        /// Allocations per thread.
        #[arg(short, long, default_value_t = 128)]
        iterations: usize,

        /// Upper bound on the 8-byte elements per allocation.
        #[arg(short, long, default_value_t = 1024)]
        max_elements: usize,

        /// Base seed; thread `i` uses `seed + i`.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Replay allocations (`a:SIZE`) and frees (`f:N`, the N-th allocation).
    Trace {
        /// Comma-separated operations, e.g. "a:80,a:60,f:1".
        #[arg(long)]
        ops: String,

        /// Emit the final layout and statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration as TOML.
    Config,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<StackConfig> {
    let mut config = match &cli.config {
        Some(path) => StackConfig::from_file(path)?,
        None => StackConfig::default(),
    };
    if let Some(size) = &cli.region_size {
        config.region_size = size.clone();
    }
    if let Some(leaf) = &cli.leaf {
        config.leaf = leaf.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Stress {
            threads,
            iterations,
            max_elements,
            seed,
        } => commands::stress::execute(&config, threads, iterations, max_elements, seed),
        Commands::Trace { ops, json } => commands::trace::execute(&config, &ops, json),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
