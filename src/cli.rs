//! Command-line interface definitions.
//!
//! The heavy lifting lives in the YAML configuration file; the CLI only
//! points at it and carries a few overrides that are handy on the shell.
//!
//! # Example
//!
//! ```bash
//! # Run with the default config.yaml in the working directory
//! linkdedup
//!
//! # Explicit config, forced dry run, debug logging
//! linkdedup -v --config /etc/linkdedup.yaml --dry-run
//! ```

use clap::Parser;
use std::path::PathBuf;

/// Duplicate file consolidator.
///
/// Finds duplicate files by content hash across the configured roots, moves
/// one canonical copy per group into a content-addressed store and replaces
/// the rest with symlinks, trashing or deleting the redundant copies.
#[derive(Debug, Parser)]
#[command(name = "linkdedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to the persistent hash journal
    #[arg(long, value_name = "FILE", default_value = "file-deduplicator.csv")]
    pub journal: PathBuf,

    /// Log intended actions without touching the filesystem,
    /// regardless of the configured dryRun value
    #[arg(long)]
    pub dry_run: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
