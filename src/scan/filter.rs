//! Eligibility check applied to files before any I/O

use crate::config::{ExtensionSet, MatchCriteria};
use std::ffi::OsStr;

/// Outcome of [`EntryFilter::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Worth opening
    Eligible,
    /// Too small to hold a tag header and one frame
    TooSmall,
    /// Extension not in the allow-list
    ExtensionRejected,
}

/// Size and extension filter for non-directory entries
#[derive(Debug, Clone, Copy)]
pub struct EntryFilter<'a> {
    min_size: u64,
    extensions: &'a ExtensionSet,
}

impl<'a> EntryFilter<'a> {
    pub fn new(criteria: &'a MatchCriteria) -> Self {
        Self {
            min_size: criteria.min_size,
            extensions: &criteria.extensions,
        }
    }

    /// Size is checked first, then extension
    pub fn check(&self, name: &OsStr, size: u64) -> Eligibility {
        if size < self.min_size {
            Eligibility::TooSmall
        } else if !self.extensions.accepts(name) {
            Eligibility::ExtensionRejected
        } else {
            Eligibility::Eligible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_TAG_SIZE;

    #[test]
    fn test_size_threshold() {
        let criteria = MatchCriteria::default();
        let filter = EntryFilter::new(&criteria);

        assert_eq!(filter.check(OsStr::new("a.mp3"), 10), Eligibility::TooSmall);
        assert_eq!(
            filter.check(OsStr::new("a.mp3"), MIN_TAG_SIZE - 1),
            Eligibility::TooSmall
        );
        assert_eq!(
            filter.check(OsStr::new("a.mp3"), MIN_TAG_SIZE),
            Eligibility::Eligible
        );
    }

    #[test]
    fn test_extension_allow_list() {
        let criteria = MatchCriteria {
            extensions: ExtensionSet::parse(["mp3"]).unwrap(),
            ..Default::default()
        };
        let filter = EntryFilter::new(&criteria);

        assert_eq!(
            filter.check(OsStr::new("a.MP3"), 100),
            Eligibility::Eligible
        );
        assert_eq!(
            filter.check(OsStr::new("a.flac"), 100),
            Eligibility::ExtensionRejected
        );
        assert_eq!(
            filter.check(OsStr::new("noext"), 100),
            Eligibility::ExtensionRejected
        );
        // Size wins when both checks fail
        assert_eq!(filter.check(OsStr::new("a.flac"), 1), Eligibility::TooSmall);
    }
}
