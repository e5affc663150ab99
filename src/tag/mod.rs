//! Tag matching
//!
//! The scanner treats matching as a black box behind [`Matcher`]: it hands
//! over an open file and the run's criteria and gets back match, no match,
//! or an error. [`TagMatcher`] is the ID3v2 implementation.

pub mod pool;
pub mod reader;

pub use pool::{PoolStats, PooledTag, TagPool};
pub use reader::{FieldSet, TagHandle};

use crate::config::MatchCriteria;
use crate::error::TagResult;
use std::fs::File;
use tracing::debug;

/// Decides whether an open file matches the criteria
///
/// Matchers are shared by every worker and called concurrently.
pub trait Matcher: Send + Sync {
    fn matches(&self, file: &mut File, criteria: &MatchCriteria) -> TagResult<bool>;

    /// Called once after the run has drained
    fn finish(&self) {}
}

/// Matches ID3v2 artist/title/year fields
#[derive(Debug)]
pub struct TagMatcher {
    pool: TagPool,
}

impl TagMatcher {
    /// Create a matcher whose pool keeps up to `pool_size` idle readers
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: TagPool::new(pool_size),
        }
    }
}

impl Matcher for TagMatcher {
    fn matches(&self, file: &mut File, criteria: &MatchCriteria) -> TagResult<bool> {
        let mut tag = self.pool.acquire();
        tag.reset(file, FieldSet::from_criteria(criteria))?;

        if !tag.has_frames() {
            return Ok(false);
        }

        Ok(field_matches(tag.artist(), criteria.artist.as_deref(), criteria.ignore_case)
            && field_matches(tag.title(), criteria.title.as_deref(), criteria.ignore_case)
            && field_matches(tag.year(), criteria.year.as_deref(), criteria.ignore_case))
    }

    fn finish(&self) {
        let stats = self.pool.stats();
        debug!(
            allocated = stats.allocated(),
            reused = stats.reused(),
            idle = self.pool.idle(),
            "Tag pool usage"
        );
    }
}

/// An unconfigured field always matches
fn field_matches(actual: &str, expected: Option<&str>, ignore_case: bool) -> bool {
    match expected {
        None => true,
        Some(expected) => strings_equal(actual, expected, ignore_case),
    }
}

/// Compare two field values, optionally folding case
pub fn strings_equal(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
    } else {
        a == b
    }
}
