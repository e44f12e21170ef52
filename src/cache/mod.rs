//! Persistent hash cache.
//!
//! Avoids re-hashing unchanged files across runs. Two components:
//!
//! * [`journal`]: the append-only, CSV-backed log, safe for concurrent
//!   readers and writers, supporting full reload and incremental append.
//! * [`entry`]: the [`FileRecord`] data model stored in the log.
//!
//! # Cache Invalidation
//!
//! There is none: presence of a path in the journal is taken as sufficient
//! evidence of an up-to-date hash. A file rewritten in place after its
//! initial hash keeps its stale record. This is a deliberate trade-off
//! (see DESIGN.md); deleting the journal forces a full re-hash.

pub mod entry;
pub mod journal;

pub use entry::{modified_millis, FileRecord};
pub use journal::{JournalError, MetaJournal};
