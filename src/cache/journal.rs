//! CSV-backed append-only metadata journal.
//!
//! The journal is the sole state persisted between runs: one [`FileRecord`]
//! per line, appended and never rewritten. It is shared across walker and
//! hasher threads, so every operation goes through a writer lock:
//! mutations (`append`, `flush`, `close`) take it, and `load_all` holds it
//! across both its forced flush and the read-back, so a full load is
//! always flush-then-read and never observes a partial append.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockWriteGuard};

use thiserror::Error;

use super::FileRecord;

/// Errors raised by journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The backing file could not be opened for appending.
    #[error("failed to open journal {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record could not be written.
    #[error("failed to append to journal: {0}")]
    Append(#[source] csv::Error),

    /// Buffered writes could not be forced to the backing file.
    #[error("failed to flush journal: {0}")]
    Flush(#[source] io::Error),
}

/// Durable, thread-safe key-value journal keyed by path.
pub struct MetaJournal {
    path: PathBuf,
    writer: RwLock<csv::Writer<File>>,
}

impl MetaJournal {
    /// Open (or create) the journal at `path` in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Open`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| JournalError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        Ok(Self {
            path: path.to_path_buf(),
            writer: RwLock::new(writer),
        })
    }

    /// Append one record to the backing log.
    ///
    /// The write is buffered; it becomes visible to `load_all` after the
    /// next flush. No deduplication happens here - the caller's overlay is
    /// responsible for not re-appending a path already present.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Append`] on a write failure.
    pub fn append(&self, record: &FileRecord) -> Result<(), JournalError> {
        let mut writer = self.write_guard();
        writer.serialize(record).map_err(JournalError::Append)
    }

    /// Force buffered writes to the backing file.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Flush`] on failure.
    pub fn flush(&self) -> Result<(), JournalError> {
        let mut writer = self.write_guard();
        writer.flush().map_err(JournalError::Flush)
    }

    /// Flush pending writes, then read the entire log from the beginning.
    ///
    /// The write guard is held across both steps, so no append can
    /// interleave and surface a half-written line to the reader.
    ///
    /// Unparseable lines are logged and skipped. Any I/O failure degrades
    /// to an empty vec: the caller must treat that as "no cache available",
    /// never as "no duplicates exist".
    #[must_use]
    pub fn load_all(&self) -> Vec<FileRecord> {
        let mut writer = self.write_guard();
        if let Err(e) = writer.flush() {
            log::error!("{} could not be flushed: {}", self.path.display(), e);
            return Vec::new();
        }

        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
        {
            Ok(reader) => reader,
            Err(e) => {
                log::error!("{} could not be read: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for result in reader.deserialize::<FileRecord>() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("skipping malformed journal line: {}", e),
            }
        }

        records
    }

    /// Flush and release the journal.
    ///
    /// Safe to call during shutdown, including from the signal handler:
    /// previously flushed data is never corrupted, and a second close is a
    /// no-op flush.
    pub fn close(&self) {
        if let Err(e) = self.flush() {
            log::error!("journal close failed: {}", e);
        }
    }

    /// Path of the backing log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // A panicking writer thread must not wedge the shutdown flush, so lock
    // poisoning is recovered rather than propagated.
    fn write_guard(&self) -> RwLockWriteGuard<'_, csv::Writer<File>> {
        self.writer.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, size: u64, mtime: i64) -> FileRecord {
        FileRecord::new(
            PathBuf::from(path),
            size,
            mtime,
            format!("md5-{}", size),
            format!("sha512-{}", size),
        )
    }

    #[test]
    fn test_append_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let journal = MetaJournal::open(&dir.path().join("journal.csv")).unwrap();

        let records = vec![
            record("/a/one.txt", 10, 100),
            record("/a/two.txt", 20, 200),
            record("/b/three.txt", 30, 300),
        ];
        for r in &records {
            journal.append(r).unwrap();
        }

        let loaded = journal.load_all();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_load_is_idempotent() {
        let dir = tempdir().unwrap();
        let journal = MetaJournal::open(&dir.path().join("journal.csv")).unwrap();
        journal.append(&record("/a", 1, 1)).unwrap();

        assert_eq!(journal.load_all().len(), 1);
        assert_eq!(journal.load_all().len(), 1);
    }

    #[test]
    fn test_load_flushes_pending_appends() {
        let dir = tempdir().unwrap();
        let journal = MetaJournal::open(&dir.path().join("journal.csv")).unwrap();

        // No explicit flush between append and load.
        journal.append(&record("/pending", 5, 5)).unwrap();
        assert_eq!(journal.load_all().len(), 1);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.csv");
        std::fs::write(&path, "/ok,1,2,aa,bb\nnot-a-record\n/ok2,3,4,cc,dd\n").unwrap();

        let journal = MetaJournal::open(&path).unwrap();
        let loaded = journal.load_all();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].path, PathBuf::from("/ok"));
        assert_eq!(loaded[1].path, PathBuf::from("/ok2"));
    }

    #[test]
    fn test_append_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.csv");

        {
            let journal = MetaJournal::open(&path).unwrap();
            journal.append(&record("/first", 1, 1)).unwrap();
            journal.close();
        }

        let journal = MetaJournal::open(&path).unwrap();
        journal.append(&record("/second", 2, 2)).unwrap();

        let loaded = journal.load_all();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].path, PathBuf::from("/first"));
        assert_eq!(loaded[1].path, PathBuf::from("/second"));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_degrades_to_empty_when_the_log_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.csv");
        let journal = MetaJournal::open(&path).unwrap();
        journal.append(&record("/a", 1, 1)).unwrap();
        journal.flush().unwrap();

        // Swap the backing file for a dangling symlink; the read-back open
        // now fails, which must mean "no cache available", not a panic or
        // an error.
        std::fs::remove_file(&path).unwrap();
        std::os::unix::fs::symlink("/no/such/target", &path).unwrap();

        assert!(journal.load_all().is_empty());
    }

    #[test]
    fn test_loads_interleaved_with_appends_stay_consistent() {
        use std::sync::Arc;

        let dir = tempdir().unwrap();
        let journal = Arc::new(MetaJournal::open(&dir.path().join("journal.csv")).unwrap());

        let appender = {
            let journal = Arc::clone(&journal);
            std::thread::spawn(move || {
                for j in 0..200 {
                    journal.append(&record(&format!("/w/f{}", j), j, j as i64)).unwrap();
                }
            })
        };
        let loader = {
            let journal = Arc::clone(&journal);
            std::thread::spawn(move || {
                for _ in 0..20 {
                    for r in journal.load_all() {
                        // Every line visible to a reader is complete.
                        assert_eq!(r.sha512, format!("sha512-{}", r.size));
                        assert_eq!(r.md5, format!("md5-{}", r.size));
                    }
                }
            })
        };
        appender.join().unwrap();
        loader.join().unwrap();

        assert_eq!(journal.load_all().len(), 200);
    }

    #[test]
    fn test_concurrent_appends() {
        use std::sync::Arc;

        let dir = tempdir().unwrap();
        let journal = Arc::new(MetaJournal::open(&dir.path().join("journal.csv")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let journal = Arc::clone(&journal);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let r = record(&format!("/t{}/f{}", i, j), j, j as i64);
                        journal.append(&r).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(journal.load_all().len(), 400);
    }
}
