//! Duplicate resolution: move, link, trash, rollback.
//!
//! Each duplicate group is resolved in two strictly ordered phases: first
//! the prominent copy is staged into its content-addressed slot, then every
//! redundant member is soft-deleted and (optionally) replaced with a
//! symlink to that slot. Groups touch disjoint paths, so different groups
//! resolve concurrently.
//!
//! The prominent staging sequence is modelled as an explicit state value
//! ([`StageState`]) instead of nested error handling, so every failure path
//! is enumerable: a failed symlink after a successful move rolls the move
//! back, and a failed rollback is the one unconditionally fatal condition
//! in the whole program - at that point the file's authoritative location
//! is ambiguous.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use crate::cache::{FileRecord, MetaJournal};
use crate::config::Configuration;
use crate::filter::PathFilter;
use crate::report::human_bytes;

use super::groups::{
    classify, group_by_digest, redundant_bytes, sort_by_prominence, warn_collision, GroupStatus,
};

/// Errors that abort the resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A staged file could not be moved back to its original path after a
    /// failed symlink. The file now lives in neither location reliably.
    #[error("rollback failed: {path} could not be restored from {slot}")]
    RollbackFailed { path: PathBuf, slot: PathBuf },

    /// The operator interrupted the run.
    #[error("resolution interrupted")]
    Interrupted,
}

/// Outcome of staging one prominent copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Dry run: the intended move and link were logged only.
    DryRun,
    /// The slot is occupied or the path is already a link; a previous run
    /// (or a crash mid-resolution) already consolidated this content.
    AlreadyConsolidated,
    /// The move into the slot failed; nothing changed.
    Skipped,
    /// Moved into the slot and the original path replaced with a symlink.
    Linked,
    /// The symlink failed; the move was undone and the file is back at its
    /// original path.
    RolledBack,
}

/// Aggregate results of one resolver pass.
#[derive(Debug, Default)]
pub struct ResolveSummary {
    /// Groups that passed filtering and the collision check.
    pub groups_processed: u64,
    /// Redundant bytes across processed groups.
    pub redundant_bytes: u64,
    /// Redundant bytes across the whole journal, filters ignored.
    pub unfiltered_redundant_bytes: u64,
}

/// Filesystem mutations performed during resolution.
///
/// A trait rather than free functions so the failure arms (rollback,
/// restore-from-trash) can be driven deterministically in tests; a real
/// filesystem cannot be made to fail a symlink without also failing the
/// move that precedes it.
pub trait FsOps: Sync {
    /// Move a file from `source` to `target`.
    fn move_file(&self, source: &Path, target: &Path) -> io::Result<()>;
    /// Create a symbolic link at `link` pointing to `target`.
    fn symlink(&self, link: &Path, target: &Path) -> io::Result<()>;
    /// Permanently remove a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`FsOps`] over the real filesystem.
#[derive(Debug, Default)]
pub struct RealFs;

static REAL_FS: RealFs = RealFs;

impl FsOps for RealFs {
    /// Rename, falling back to copy-and-remove across filesystems.
    fn move_file(&self, source: &Path, target: &Path) -> io::Result<()> {
        match std::fs::rename(source, target) {
            Ok(()) => {
                log::info!("Moved {} to {}", source.display(), target.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                std::fs::copy(source, target)?;
                std::fs::remove_file(source)?;
                log::info!(
                    "Moved {} to {} across filesystems",
                    source.display(),
                    target.display()
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn symlink(&self, link: &Path, target: &Path) -> io::Result<()> {
        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(target, link);
        #[cfg(windows)]
        let result = std::os::windows::fs::symlink_file(target, link);

        result?;
        log::info!(
            "Created symbolic link {} to {}",
            link.display(),
            target.display()
        );
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Duplicate grouping and resolution engine.
pub struct Resolver<'a> {
    config: &'a Configuration,
    journal: &'a MetaJournal,
    filter: &'a PathFilter,
    shutdown: Arc<AtomicBool>,
    ops: &'a dyn FsOps,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over the given journal.
    #[must_use]
    pub fn new(
        config: &'a Configuration,
        journal: &'a MetaJournal,
        filter: &'a PathFilter,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self::with_ops(config, journal, filter, shutdown, &REAL_FS)
    }

    /// Create a resolver with explicit filesystem operations.
    #[must_use]
    pub fn with_ops(
        config: &'a Configuration,
        journal: &'a MetaJournal,
        filter: &'a PathFilter,
        shutdown: Arc<AtomicBool>,
        ops: &'a dyn FsOps,
    ) -> Self {
        Self {
            config,
            journal,
            filter,
            shutdown,
            ops,
        }
    }

    /// Reload the journal, group, and resolve every processable group.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::RollbackFailed`] if a prominent copy could
    /// not be restored after a failed symlink (fatal), or
    /// [`ResolveError::Interrupted`] on operator shutdown.
    pub fn run(&self) -> Result<ResolveSummary, ResolveError> {
        let records = self.journal.load_all();

        let filtered: Vec<FileRecord> = records
            .iter()
            .filter(|record| self.filter.matches(&record.path))
            .cloned()
            .collect();

        let reclaimed = AtomicU64::new(0);
        let processed = AtomicU64::new(0);

        group_by_digest(filtered)
            .into_par_iter()
            .try_for_each(|(_, mut group)| {
                if self.shutdown.load(Ordering::SeqCst) {
                    return Err(ResolveError::Interrupted);
                }

                match classify(&group) {
                    GroupStatus::Unique => return Ok(()),
                    GroupStatus::Collision => {
                        warn_collision(&group);
                        return Ok(());
                    }
                    GroupStatus::Duplicates => {}
                }

                sort_by_prominence(&mut group);
                reclaimed.fetch_add(redundant_bytes(&group), Ordering::SeqCst);
                processed.fetch_add(1, Ordering::SeqCst);
                self.process_group(&group)
            })?;

        // The same accounting over the unfiltered record set shows what
        // could additionally be reclaimed by removing the filters.
        let unfiltered_total: u64 = group_by_digest(records)
            .values()
            .filter(|group| classify(group) == GroupStatus::Duplicates)
            .map(|group| redundant_bytes(group))
            .sum();

        let summary = ResolveSummary {
            groups_processed: processed.load(Ordering::SeqCst),
            redundant_bytes: reclaimed.load(Ordering::SeqCst),
            unfiltered_redundant_bytes: unfiltered_total,
        };

        log::info!(
            "{} of redundant data detected",
            human_bytes(summary.redundant_bytes)
        );
        let difference = summary
            .unfiltered_redundant_bytes
            .saturating_sub(summary.redundant_bytes);
        if difference > 0 {
            log::info!(
                "An additional {} of data may be deduplicated by processing all files.",
                human_bytes(difference)
            );
        }

        Ok(summary)
    }

    /// Resolve one sorted group: stage the prominent head, then resolve
    /// every redundant member against the slot.
    fn process_group(&self, group: &[FileRecord]) -> Result<(), ResolveError> {
        let Some((prominent, redundant)) = group.split_first() else {
            return Ok(());
        };
        let slot = self.config.deduplication.join(&prominent.sha512);

        let state = self.stage_prominent(prominent, &slot)?;
        if state == StageState::Skipped || state == StageState::RolledBack {
            // The slot is unoccupied; linking the redundant members now
            // would leave dangling symlinks.
            log::warn!(
                "leaving {} redundant copies of {} untouched",
                redundant.len(),
                prominent.sha512
            );
            return Ok(());
        }

        for record in redundant {
            self.resolve_redundant(record, &slot);
        }

        Ok(())
    }

    /// Move the prominent copy into its content-addressed slot and replace
    /// the original path with a symlink.
    fn stage_prominent(
        &self,
        prominent: &FileRecord,
        slot: &Path,
    ) -> Result<StageState, ResolveError> {
        let path = &prominent.path;

        if self.config.dry_run {
            log::info!(
                "The prominent {} will be moved to {} and a symbolic link created",
                path.display(),
                slot.display()
            );
            return Ok(StageState::DryRun);
        }

        if !path.exists() || path.is_symlink() || slot.exists() {
            log::info!("{} already moved to {}", path.display(), slot.display());
            return Ok(StageState::AlreadyConsolidated);
        }

        if let Err(e) = self.ops.move_file(path, slot) {
            log::error!(
                "failed to move {} to {}: {}",
                path.display(),
                slot.display(),
                e
            );
            return Ok(StageState::Skipped);
        }
        // Staged: the file is in the slot but the original path is empty.
        // The only ways out are Linked or RolledBack.
        match self.ops.symlink(path, slot) {
            Ok(()) => Ok(StageState::Linked),
            Err(e) => {
                log::error!(
                    "failed to create symbolic link {} to {}: {}",
                    path.display(),
                    slot.display(),
                    e
                );
                match self.ops.move_file(slot, path) {
                    Ok(()) => {
                        log::warn!("rolled back {} from {}", path.display(), slot.display());
                        Ok(StageState::RolledBack)
                    }
                    Err(rollback_err) => {
                        log::error!("Rollback failed! {}", rollback_err);
                        Err(ResolveError::RollbackFailed {
                            path: path.clone(),
                            slot: slot.to_path_buf(),
                        })
                    }
                }
            }
        }
    }

    /// Soft-delete one redundant member and optionally replace it with a
    /// symlink to the slot. Failures here never abort the run: the member
    /// is left as close to its previous state as possible.
    fn resolve_redundant(&self, record: &FileRecord, slot: &Path) {
        let path = &record.path;

        if !path.exists() || path.is_symlink() {
            log::info!("{} already pointed at {}", path.display(), slot.display());
            return;
        }

        let trash = self.config.trash.join(trash_file_name(path));

        if self.config.dry_run {
            self.log_dry_run(path, &trash, slot);
            return;
        }

        // Soft delete first; the copy stays recoverable until the symlink
        // is known good.
        if let Err(e) = self.ops.move_file(path, &trash) {
            log::error!(
                "failed to move {} to {}: {}",
                path.display(),
                trash.display(),
                e
            );
            return;
        }

        if self.config.replace_with_symlink {
            match self.ops.symlink(path, slot) {
                Ok(()) => {
                    if !self.config.safe_delete {
                        self.discard(&trash);
                    }
                }
                Err(e) => {
                    log::error!(
                        "failed to create symbolic link {} to {}: {}",
                        path.display(),
                        slot.display(),
                        e
                    );
                    // Undo the soft delete so the member is untouched.
                    if let Err(e) = self.ops.move_file(&trash, path) {
                        log::error!(
                            "failed to restore {} from {}: {}",
                            path.display(),
                            trash.display(),
                            e
                        );
                    }
                }
            }
        }
    }

    /// Best-effort permanent removal; failure is logged, never propagated.
    fn discard(&self, path: &Path) {
        match self.ops.remove_file(path) {
            Ok(()) => log::info!("Deleted {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::error!("Failed to delete {}: {}", path.display(), e),
        }
    }

    fn log_dry_run(&self, path: &Path, trash: &Path, slot: &Path) {
        let mut message = if self.config.safe_delete {
            format!("{} will be moved to {}", path.display(), trash.display())
        } else {
            format!("{} will be permanently deleted", path.display())
        };
        if self.config.replace_with_symlink {
            message.push_str(&format!(" and symlinked to {}", slot.display()));
        }
        log::info!("{}", message);
    }
}

/// Flatten an absolute path into a single trash file name by replacing
/// path separators with underscores.
#[must_use]
pub fn trash_file_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::{tempdir, TempDir};

    use crate::cache::{FileRecord, MetaJournal};
    use crate::config::Configuration;
    use crate::filter::PathFilter;

    const CONTENT: &[u8] = b"duplicate content";
    const DIGEST: &str = "feedface";

    struct Fixture {
        _dir: TempDir,
        config: Configuration,
        journal: MetaJournal,
        data: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        let store = dir.path().join("store");
        fs::create_dir(&store).unwrap();
        let trash = dir.path().join("trash");
        fs::create_dir(&trash).unwrap();
        let journal = MetaJournal::open(&dir.path().join("journal.csv")).unwrap();

        let config = Configuration {
            dry_run: false,
            deduplication: store,
            safe_delete: true,
            trash,
            replace_with_symlink: true,
            roots: vec![data.clone()],
            inclusions: vec![],
            exclusions: vec![],
        };

        Fixture {
            _dir: dir,
            config,
            journal,
            data,
        }
    }

    /// Write a real file and journal it as a member of the one test group.
    fn add_member(fx: &Fixture, name: &str, mtime: i64) -> PathBuf {
        let path = fx.data.join(name);
        fs::write(&path, CONTENT).unwrap();
        let record = FileRecord::new(
            path.clone(),
            CONTENT.len() as u64,
            mtime,
            "m".to_string(),
            DIGEST.to_string(),
        );
        fx.journal.append(&record).unwrap();
        path
    }

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    /// Delegates to the real filesystem except where told to fail.
    struct FlakyFs {
        fail_move_from: Option<PathBuf>,
        fail_link_at: Option<PathBuf>,
    }

    impl FsOps for FlakyFs {
        fn move_file(&self, source: &Path, target: &Path) -> io::Result<()> {
            if self.fail_move_from.as_deref() == Some(source) {
                return Err(io::Error::other("injected move failure"));
            }
            RealFs.move_file(source, target)
        }

        fn symlink(&self, link: &Path, target: &Path) -> io::Result<()> {
            if self.fail_link_at.as_deref() == Some(link) {
                return Err(io::Error::other("injected link failure"));
            }
            RealFs.symlink(link, target)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            RealFs.remove_file(path)
        }
    }

    #[test]
    fn test_failed_prominent_link_rolls_the_move_back() {
        let fx = fixture();
        let older = add_member(&fx, "older.txt", 1_000);
        let newer = add_member(&fx, "newer.txt", 2_000);

        let ops = FlakyFs {
            fail_move_from: None,
            fail_link_at: Some(newer.clone()),
        };
        let filter = PathFilter::new(&[], &[]).unwrap();
        let resolver = Resolver::with_ops(&fx.config, &fx.journal, &filter, flag(), &ops);
        let summary = resolver.run().unwrap();

        // The move into the slot was undone and the whole group left alone.
        assert!(newer.is_file() && !newer.is_symlink());
        assert_eq!(fs::read(&newer).unwrap(), CONTENT);
        assert!(older.is_file() && !older.is_symlink());
        assert!(!fx.config.deduplication.join(DIGEST).exists());
        assert_eq!(fs::read_dir(&fx.config.trash).unwrap().count(), 0);
        assert_eq!(summary.groups_processed, 1);
    }

    #[test]
    fn test_failed_rollback_is_fatal() {
        let fx = fixture();
        add_member(&fx, "older.txt", 1_000);
        let newer = add_member(&fx, "newer.txt", 2_000);
        let slot = fx.config.deduplication.join(DIGEST);

        // The link fails, then the restoring move out of the slot fails too.
        let ops = FlakyFs {
            fail_move_from: Some(slot.clone()),
            fail_link_at: Some(newer.clone()),
        };
        let filter = PathFilter::new(&[], &[]).unwrap();
        let resolver = Resolver::with_ops(&fx.config, &fx.journal, &filter, flag(), &ops);

        let err = resolver.run().unwrap_err();
        assert!(matches!(err, ResolveError::RollbackFailed { .. }));
        // The bytes survive in the slot even though the path is gone.
        assert!(slot.is_file());
        assert!(!newer.exists());
    }

    #[test]
    fn test_failed_redundant_link_restores_the_trashed_copy() {
        let fx = fixture();
        let older = add_member(&fx, "older.txt", 1_000);
        let newer = add_member(&fx, "newer.txt", 2_000);

        let ops = FlakyFs {
            fail_move_from: None,
            fail_link_at: Some(older.clone()),
        };
        let filter = PathFilter::new(&[], &[]).unwrap();
        let resolver = Resolver::with_ops(&fx.config, &fx.journal, &filter, flag(), &ops);
        resolver.run().unwrap();

        // Prominent staging succeeded.
        let slot = fx.config.deduplication.join(DIGEST);
        assert!(slot.is_file());
        assert!(newer.is_symlink());

        // The redundant member's soft delete was undone: the file is back
        // at its original path and the trash holds nothing.
        assert!(older.is_file() && !older.is_symlink());
        assert_eq!(fs::read(&older).unwrap(), CONTENT);
        assert_eq!(fs::read_dir(&fx.config.trash).unwrap().count(), 0);
    }

    #[test]
    fn test_trash_file_name_flattens_separators() {
        let sep = std::path::MAIN_SEPARATOR;
        let path = PathBuf::from(format!("{sep}home{sep}user{sep}file.txt"));
        assert_eq!(trash_file_name(&path), "_home_user_file.txt");
    }

    #[test]
    fn test_trash_file_name_has_no_separators() {
        let path = PathBuf::from("/a/b/c/d/e.bin");
        assert!(!trash_file_name(&path).contains(std::path::MAIN_SEPARATOR));
    }
}
