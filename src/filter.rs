//! Regex-based path inclusion/exclusion.
//!
//! A path participates in deduplication iff it is included and not excluded.
//! Inclusion patterns are searched case-insensitively anywhere in the
//! absolute path string; an empty inclusion set includes everything.
//! Exclusion patterns are searched case-sensitively; an empty exclusion set
//! excludes nothing.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// A pattern failed to compile. Raised at startup, never mid-run.
#[derive(Debug, Error)]
#[error("invalid filter pattern '{pattern}': {source}")]
pub struct FilterError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Compiled include/exclude predicate over absolute path strings.
#[derive(Debug)]
pub struct PathFilter {
    inclusions: Vec<Regex>,
    exclusions: Vec<Regex>,
}

impl PathFilter {
    /// Compile the configured pattern lists.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] for the first pattern that fails to compile.
    pub fn new(inclusions: &[String], exclusions: &[String]) -> Result<Self, FilterError> {
        let inclusions = inclusions
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| FilterError {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclusions = exclusions
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| FilterError {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            inclusions,
            exclusions,
        })
    }

    /// Check whether a path matches the inclusion set.
    #[must_use]
    pub fn is_included(&self, path: &Path) -> bool {
        if self.inclusions.is_empty() {
            return true;
        }

        let path = path.to_string_lossy();
        self.inclusions.iter().any(|re| re.is_match(&path))
    }

    /// Check whether a path matches the exclusion set.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclusions.is_empty() {
            return false;
        }

        let path = path.to_string_lossy();
        self.exclusions.iter().any(|re| re.is_match(&path))
    }

    /// Included and not excluded.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.is_included(path) && !self.is_excluded(path)
    }
}
