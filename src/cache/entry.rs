//! Journal entry definitions.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One observed regular file.
///
/// Field order matters: it defines the CSV column order
/// (`path,size,lastModified,md5,sha512`).
///
/// A record is authoritative for its path as long as the path exists in the
/// journal; size/mtime drift after the initial hash is NOT detected. Records
/// are append-only and never rewritten in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path; unique key within the journal.
    pub path: PathBuf,
    /// Byte length at the time of hashing.
    pub size: u64,
    /// Modification time in epoch milliseconds. Used only as the
    /// prominence tie-break, never for cache invalidation.
    pub last_modified: i64,
    /// Fast/legacy digest (128-bit), lowercase hex.
    pub md5: String,
    /// Strong digest (512-bit), lowercase hex. Groups key on this.
    pub sha512: String,
}

impl FileRecord {
    /// Create a record.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, last_modified: i64, md5: String, sha512: String) -> Self {
        Self {
            path,
            size,
            last_modified,
            md5,
            sha512,
        }
    }
}

/// Convert a modification time to epoch milliseconds.
///
/// Times before the epoch clamp to 0; mtime is only a tie-break, so the
/// loss of pre-1970 precision is acceptable.
#[must_use]
pub fn modified_millis(modified: SystemTime) -> i64 {
    modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_modified_millis() {
        let t = UNIX_EPOCH + Duration::from_millis(1_234_567);
        assert_eq!(modified_millis(t), 1_234_567);
    }

    #[test]
    fn test_modified_millis_before_epoch_clamps() {
        let t = UNIX_EPOCH - Duration::from_secs(60);
        assert_eq!(modified_millis(t), 0);
    }
}
