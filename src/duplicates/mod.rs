//! Duplicate grouping and resolution.

pub mod groups;
pub mod resolver;

pub use groups::{classify, group_by_digest, redundant_bytes, sort_by_prominence, GroupStatus};
pub use resolver::{FsOps, RealFs, ResolveError, ResolveSummary, Resolver, StageState};
