//! Grouping, collision detection, prominence and accounting.
//!
//! Groups key on the strong digest (SHA-512). Agreement of the independent
//! MD5 digest is required before a group may be processed: a disagreement
//! means at least two distinct contents collided on SHA-512, which is
//! treated as evidence of error, never as genuine duplication.

use std::collections::HashMap;

use crate::cache::FileRecord;

/// What the resolver may do with one digest group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// Two or more members, digests agree: process.
    Duplicates,
    /// Fewer than two members: nothing to do.
    Unique,
    /// Strong digests match but fast digests disagree: exclude.
    Collision,
}

/// Group records by their strong digest.
#[must_use]
pub fn group_by_digest(records: Vec<FileRecord>) -> HashMap<String, Vec<FileRecord>> {
    let mut groups: HashMap<String, Vec<FileRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.sha512.clone()).or_default().push(record);
    }
    groups
}

/// Classify a digest group.
#[must_use]
pub fn classify(group: &[FileRecord]) -> GroupStatus {
    let first_md5 = match group.first() {
        Some(record) => &record.md5,
        None => return GroupStatus::Unique,
    };
    if group.iter().any(|record| record.md5 != *first_md5) {
        return GroupStatus::Collision;
    }
    if group.len() > 1 {
        GroupStatus::Duplicates
    } else {
        GroupStatus::Unique
    }
}

/// Log the members of a colliding group by file name.
pub fn warn_collision(group: &[FileRecord]) {
    let names: Vec<String> = group
        .iter()
        .filter_map(|record| record.path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    log::warn!("Hash collision detected for: {}", names.join(", "));
}

/// Sort so the most recently modified member comes first.
///
/// The head after sorting is the "prominent" copy; everything after it is
/// redundant. The sort is stable, so ties keep their journal order.
pub fn sort_by_prominence(group: &mut [FileRecord]) {
    group.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
}

/// Bytes reclaimable from one group: the sum of all sizes minus the
/// prominent member's size. The member excluded follows the prominence
/// rule (most recently modified), not the largest size.
#[must_use]
pub fn redundant_bytes(group: &[FileRecord]) -> u64 {
    let Some(prominent) = group.iter().reduce(|best, candidate| {
        if candidate.last_modified > best.last_modified {
            candidate
        } else {
            best
        }
    }) else {
        return 0;
    };

    group.iter().map(|record| record.size).sum::<u64>() - prominent.size
}
