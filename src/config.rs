//! Run configuration loaded from a YAML file.
//!
//! The configuration is plain data: all validation beyond YAML well-formedness
//! (regex compilation, directory creation) happens where the values are used,
//! at startup, so a bad configuration fails fast before any filesystem work.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Everything a run needs to know, as written by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Log intended actions without touching the filesystem.
    pub dry_run: bool,
    /// Root of the content-addressed store; slots are named by SHA-512.
    pub deduplication: PathBuf,
    /// Keep trashed copies even after a successful symlink replacement.
    pub safe_delete: bool,
    /// Directory receiving soft-deleted redundant copies.
    pub trash: PathBuf,
    /// Replace redundant copies with symlinks into the store.
    pub replace_with_symlink: bool,
    /// Directories to scan for duplicates.
    pub roots: Vec<PathBuf>,
    /// Case-insensitive inclusion regexes; empty means include everything.
    #[serde(default)]
    pub inclusions: Vec<String>,
    /// Case-sensitive exclusion regexes; empty means exclude nothing.
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl Configuration {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}
