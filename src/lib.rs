//! linkdedup - Duplicate File Consolidator
//!
//! Finds duplicate files across a set of root directories by content hash
//! and consolidates each group into a single content-addressed slot, with
//! the redundant copies soft-deleted and optionally replaced by symlinks.
//! A persistent CSV journal avoids re-hashing paths across runs.

pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod filter;
pub mod logging;
pub mod report;
pub mod scanner;
pub mod signal;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};

use cache::MetaJournal;
use cli::Cli;
use config::Configuration;
use duplicates::Resolver;
use error::ExitCode;
use filter::PathFilter;
use scanner::Prefetcher;

/// Run a full prefetch-then-resolve pass.
///
/// All components are constructed explicitly here and passed down by
/// reference; the journal is the only shared handle, and the signal
/// handler owns a clone of it so an interrupt can flush before exit.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Configuration::load(&cli.config)?;
    if cli.dry_run {
        config.dry_run = true;
    }
    log::debug!("configuration: {:?}", config);

    if !config.dry_run {
        fs::create_dir_all(&config.deduplication).with_context(|| {
            format!(
                "failed to create store directory {}",
                config.deduplication.display()
            )
        })?;
        fs::create_dir_all(&config.trash).with_context(|| {
            format!("failed to create trash directory {}", config.trash.display())
        })?;
    }

    let filter = PathFilter::new(&config.inclusions, &config.exclusions)?;
    let journal = Arc::new(MetaJournal::open(&cli.journal)?);
    let handler = signal::install_handler(Arc::clone(&journal))?;

    let prefetcher = Prefetcher::new(&journal, &filter, handler.get_flag());
    let stats = prefetcher.run(&config.roots);
    log::info!(
        "prefetch complete: {} hashed, {} already journaled, {} failed",
        stats.hashed,
        stats.cached,
        stats.failed
    );

    let resolver = Resolver::new(&config, &journal, &filter, handler.get_flag());
    let summary = resolver.run()?;
    log::debug!("processed {} duplicate groups", summary.groups_processed);

    journal.close();
    Ok(ExitCode::Success)
}
