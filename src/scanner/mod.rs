//! Concurrent walk/hash prefetch pipeline.
//!
//! Walks every configured root, hashes files the journal has not seen, and
//! appends the results so the resolver can work from a complete metadata
//! set. Traversal uses [`jwalk`] and per-file work fans out over rayon, so
//! both intra-root and inter-root parallelism apply.
//!
//! A shared overlay set (seeded from the journal) guarantees a path is
//! hashed and appended at most once per run, even when the same file is
//! reachable via two roots. Errors walking one subtree or hashing one file
//! are logged and skipped; they never abort the pipeline.

pub mod hasher;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use jwalk::WalkDir;
use rayon::prelude::*;

use crate::cache::{modified_millis, FileRecord, MetaJournal};
use crate::filter::PathFilter;
use crate::report;

pub use hasher::{hash_file, HashAlgorithm, HashError, READ_BUFFER_SIZE};

/// Digests computed for every new file, in one read.
const DIGESTS: [HashAlgorithm; 2] = [HashAlgorithm::Md5, HashAlgorithm::Sha512];

/// Counters for one pipeline run.
#[derive(Debug, Default)]
pub struct PrefetchStats {
    /// Files hashed and appended this run.
    pub hashed: u64,
    /// Files skipped because their path was already journaled.
    pub cached: u64,
    /// Files that failed to stat or hash.
    pub failed: u64,
}

/// The walk/hash/persist pipeline.
pub struct Prefetcher<'a> {
    journal: &'a MetaJournal,
    filter: &'a PathFilter,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Prefetcher<'a> {
    /// Create a pipeline over the given journal and filter.
    #[must_use]
    pub fn new(journal: &'a MetaJournal, filter: &'a PathFilter, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            journal,
            filter,
            shutdown,
        }
    }

    /// Walk and hash every root, appending new records to the journal.
    ///
    /// The overlay is seeded from a full journal load, so paths hashed in
    /// earlier runs are skipped without a stat or read.
    pub fn run(&self, roots: &[PathBuf]) -> PrefetchStats {
        let overlay: Mutex<HashSet<PathBuf>> = Mutex::new(
            self.journal
                .load_all()
                .into_iter()
                .map(|record| record.path)
                .collect(),
        );

        let hashed = AtomicU64::new(0);
        let cached = AtomicU64::new(0);
        let failed = AtomicU64::new(0);

        roots.par_iter().for_each(|root| {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            self.prefetch_root(root, &overlay, &hashed, &cached, &failed);
        });

        PrefetchStats {
            hashed: hashed.load(Ordering::SeqCst),
            cached: cached.load(Ordering::SeqCst),
            failed: failed.load(Ordering::SeqCst),
        }
    }

    fn prefetch_root(
        &self,
        root: &Path,
        overlay: &Mutex<HashSet<PathBuf>>,
        hashed: &AtomicU64,
        cached: &AtomicU64,
        failed: &AtomicU64,
    ) {
        let root = match std::path::absolute(root) {
            Ok(root) => root,
            Err(e) => {
                log::error!("cannot resolve root {}: {}", root.display(), e);
                return;
            }
        };
        log::info!("scanning {}", root.display());

        let extensions: Mutex<HashMap<String, u64>> = Mutex::new(HashMap::new());

        // jwalk parallelizes the traversal itself; the discovered files are
        // then hashed on the rayon pool.
        let files: Vec<PathBuf> = WalkDir::new(&root)
            .skip_hidden(false)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| {
                if self.shutdown.load(Ordering::SeqCst) {
                    return None;
                }
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::error!("walk error under {}: {}", root.display(), e);
                        return None;
                    }
                };
                let path = entry.path();
                is_visitable_file(entry.file_type(), &path).then_some(path)
            })
            .collect();

        files.into_par_iter().for_each(|path| {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }

            // Advisory only: tally extensions of filtered-out files so the
            // hint report can point at the worst offenders.
            if !self.filter.matches(&path) {
                tally_extension(&extensions, &path);
            }

            // Atomic check-and-reserve; a second visit to the same path
            // (e.g. via an overlapping root) bails out here.
            if !lock_recover(overlay).insert(path.clone()) {
                cached.fetch_add(1, Ordering::SeqCst);
                return;
            }

            match self.hash_and_append(&path) {
                Ok(()) => {
                    hashed.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    log::error!("failed to store hash for {}: {}", path.display(), e);
                    failed.fetch_add(1, Ordering::SeqCst);
                    // Release the reservation so a later visit can retry.
                    lock_recover(overlay).remove(&path);
                }
            }
        });

        if let Err(e) = self.journal.flush() {
            log::error!("journal flush after {} failed: {}", root.display(), e);
        }

        log_extension_hint(&lock_recover(&extensions));
    }

    fn hash_and_append(&self, path: &Path) -> anyhow::Result<()> {
        let started = Instant::now();

        let metadata = std::fs::metadata(path)?;
        let size = metadata.len();
        let last_modified = modified_millis(metadata.modified()?);

        let mut hashes = hash_file(path, &DIGESTS)?;
        let md5 = hashes
            .remove(&HashAlgorithm::Md5)
            .expect("md5 was requested");
        let sha512 = hashes
            .remove(&HashAlgorithm::Sha512)
            .expect("sha512 was requested");

        log::debug!("hashed {} in {:?}", path.display(), started.elapsed());

        let record = FileRecord::new(path.to_path_buf(), size, last_modified, md5, sha512);
        self.journal.append(&record)?;
        Ok(())
    }
}

/// Regular files qualify; so do symlinks that resolve to regular files,
/// which is what redundant copies look like after a previous run.
fn is_visitable_file(file_type: std::fs::FileType, path: &Path) -> bool {
    if file_type.is_file() {
        return true;
    }
    if file_type.is_symlink() {
        return std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
    }
    false
}

fn tally_extension(extensions: &Mutex<HashMap<String, u64>>, path: &Path) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if let Some(ext) = report::extension(name) {
        *lock_recover(extensions).entry(ext).or_insert(0) += 1;
    }
}

/// Log the "top offending extensions" report for one root.
///
/// The cutoff is the count at index `min(10, len / 10)` of the counts
/// sorted descending; every extension at or above it is reported.
fn log_extension_hint(counts: &HashMap<String, u64>) {
    if counts.is_empty() {
        return;
    }

    let mut values: Vec<u64> = counts.values().copied().collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    let cutoff = values[usize::min(10, values.len() / 10)];

    log::info!("Please consider de-duplicating the following extensions:");
    let mut reported: Vec<(&String, &u64)> = counts
        .iter()
        .filter(|(_, &count)| count >= cutoff)
        .collect();
    reported.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (ext, count) in reported {
        log::info!("{} => {}", ext, count);
    }
}

fn lock_recover<'m, T>(mutex: &'m Mutex<T>) -> std::sync::MutexGuard<'m, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
