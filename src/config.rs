//! Configuration types for tagrep
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The immutable match criteria shared by every scan task
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::Parser;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Smallest file that can hold an ID3v2 header (10 bytes) plus one frame header (10 bytes)
pub const MIN_TAG_SIZE: u64 = 20;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Default capacity of the tag handle pool
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Wildcard accepted by `--exts`
const ANY_EXTENSION: &str = "*";

/// Search audio files by their ID3v2 tags
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tagrep",
    version,
    about = "Search audio files by their ID3v2 tags",
    long_about = "Scans one or more directories in parallel and prints every file whose \
                  ID3v2 tag matches all of the given fields.\n\n\
                  Matches are printed as they are found, followed by a summary line.",
    after_help = "EXAMPLES:\n    \
        tagrep --artist 'Yung Lean' -r ~/Music\n    \
        tagrep --title 'Ginseng Strip 2002' -i -e mp3 ./library ./incoming\n    \
        tagrep --year 2013 -r --abs --exclude '/\\.Trash' ~/Music"
)]
pub struct CliArgs {
    /// Directories (or files) to search
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Match artist
    #[arg(long, value_name = "STR")]
    pub artist: Option<String>,

    /// Match title
    #[arg(long, value_name = "STR")]
    pub title: Option<String>,

    /// Match year
    #[arg(long, value_name = "STR")]
    pub year: Option<String>,

    /// Recursive search
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Compare fields case-insensitively
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Verbose output (report every skipped file on stderr)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print absolute paths
    #[arg(long)]
    pub abs: bool,

    /// Comma-separated list of extensions to inspect ('*' accepts all)
    #[arg(
        short = 'e',
        long = "exts",
        value_name = "LIST",
        value_delimiter = ',',
        default_value = ANY_EXTENSION
    )]
    pub exts: Vec<String>,

    /// Number of worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Maximum directory depth (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Abort the whole run on the first unreadable directory
    #[arg(long)]
    pub fail_fast: bool,

    /// Show a live progress spinner on stderr
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Number of tag readers kept for reuse
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, value_name = "NUM")]
    pub pool_size: usize,
}

fn default_workers() -> usize {
    // Directory listing and tag reads are I/O bound
    num_cpus::get() * 2
}

/// Extension allow-list applied to files before tags are read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtensionSet {
    /// Every file is inspected
    #[default]
    Any,
    /// Only files with one of these extensions (lowercase, no leading dot)
    Only(Vec<String>),
}

impl ExtensionSet {
    /// Build an allow-list from user input
    ///
    /// Items may hold several comma-separated extensions. Each one is
    /// trimmed, lowercased and stripped of a leading dot. A `*`
    /// anywhere in the list accepts every file.
    pub fn parse<I, S>(items: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exts = Vec::new();
        for item in items {
            for part in item.as_ref().split(',') {
                let part = part.trim();
                if part == ANY_EXTENSION {
                    return Ok(ExtensionSet::Any);
                }
                let ext = part.trim_start_matches('.').to_ascii_lowercase();
                if !ext.is_empty() && !exts.contains(&ext) {
                    exts.push(ext);
                }
            }
        }

        if exts.is_empty() {
            return Err(ConfigError::EmptyExtensionList);
        }
        Ok(ExtensionSet::Only(exts))
    }

    /// Check whether a file name carries an accepted extension
    pub fn accepts(&self, name: &OsStr) -> bool {
        match self {
            ExtensionSet::Any => true,
            ExtensionSet::Only(exts) => Path::new(name)
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)))
                .unwrap_or(false),
        }
    }
}

/// Immutable description of what counts as a match
///
/// Built once before the first task is spawned and shared read-only
/// by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCriteria {
    /// Required artist (TPE1)
    pub artist: Option<String>,

    /// Required title (TIT2)
    pub title: Option<String>,

    /// Required year (TYER, or TDRC)
    pub year: Option<String>,

    /// Compare fields case-insensitively
    pub ignore_case: bool,

    /// Extension allow-list
    pub extensions: ExtensionSet,

    /// Descend into sub-directories
    pub recursive: bool,

    /// Files smaller than this are never opened
    pub min_size: u64,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            artist: None,
            title: None,
            year: None,
            ignore_case: false,
            extensions: ExtensionSet::Any,
            recursive: false,
            min_size: MIN_TAG_SIZE,
        }
    }
}

impl MatchCriteria {
    /// True when no field constraint is configured
    pub fn is_empty(&self) -> bool {
        self.artist.is_none() && self.title.is_none() && self.year.is_none()
    }
}

/// What to do when a directory cannot be listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Record the failure, keep scanning sibling subtrees
    #[default]
    Continue,
    /// Stop every worker on the first failure
    Abort,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Roots to scan
    pub roots: Vec<PathBuf>,

    /// Match criteria shared by every task
    pub criteria: MatchCriteria,

    /// Number of worker threads
    pub worker_count: usize,

    /// Maximum traversal depth
    pub max_depth: Option<usize>,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Directory listing failure policy
    pub error_policy: ErrorPolicy,

    /// Tag handle pool capacity
    pub pool_size: usize,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,

    /// Working directory captured at startup, set when absolute paths are requested
    pub absolute_base: Option<PathBuf>,
}

impl ScanConfig {
    /// Configuration with default tuning for the given roots and criteria
    pub fn new(roots: Vec<PathBuf>, criteria: MatchCriteria) -> Self {
        Self {
            roots,
            criteria,
            worker_count: default_workers().min(MAX_WORKERS),
            max_depth: None,
            exclude_patterns: Vec::new(),
            error_policy: ErrorPolicy::Continue,
            pool_size: DEFAULT_POOL_SIZE,
            show_progress: false,
            verbose: false,
            absolute_base: None,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.paths.is_empty() {
            return Err(ConfigError::NoRoots);
        }

        // Empty strings impose no constraint
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let criteria = MatchCriteria {
            artist: non_empty(args.artist),
            title: non_empty(args.title),
            year: non_empty(args.year),
            ignore_case: args.ignore_case,
            extensions: ExtensionSet::parse(&args.exts)?,
            recursive: args.recursive,
            min_size: MIN_TAG_SIZE,
        };

        if criteria.is_empty() {
            return Err(ConfigError::NoCriteria);
        }

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize {
                size: args.pool_size,
            });
        }

        // Compile exclude patterns
        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let absolute_base = if args.abs {
            Some(std::env::current_dir().map_err(ConfigError::WorkingDir)?)
        } else {
            None
        };

        Ok(Self {
            roots: args.paths,
            criteria,
            worker_count: args.workers,
            max_depth: args.max_depth,
            exclude_patterns,
            error_policy: if args.fail_fast {
                ErrorPolicy::Abort
            } else {
                ErrorPolicy::Continue
            },
            pool_size: args.pool_size,
            show_progress: args.progress,
            verbose: args.verbose,
            absolute_base,
        })
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.exclude_patterns.iter().any(|re| re.is_match(&path))
    }

    /// Check whether a directory at `depth` may still be listed
    pub fn within_depth(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("tagrep").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_paths_required() {
        assert!(CliArgs::try_parse_from(["tagrep", "--artist", "A"]).is_err());
    }

    #[test]
    fn test_default_extension_is_wildcard() {
        let args = parse(&["--artist", "A", "music"]);
        assert_eq!(args.exts, vec!["*".to_string()]);

        let config = ScanConfig::from_args(args).unwrap();
        assert_eq!(config.criteria.extensions, ExtensionSet::Any);
        assert_eq!(config.criteria.min_size, MIN_TAG_SIZE);
        assert_eq!(config.error_policy, ErrorPolicy::Continue);
    }

    #[test]
    fn test_extension_list_parsing() {
        let args = parse(&["--title", "T", "-e", "MP3,.flac", "a", "b"]);
        let config = ScanConfig::from_args(args).unwrap();
        assert_eq!(
            config.criteria.extensions,
            ExtensionSet::Only(vec!["mp3".into(), "flac".into()])
        );
        assert_eq!(config.roots, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_extension_set_accepts() {
        let set = ExtensionSet::parse(["mp3"]).unwrap();
        assert!(set.accepts(OsStr::new("song.mp3")));
        assert!(set.accepts(OsStr::new("SONG.MP3")));
        assert!(!set.accepts(OsStr::new("song.flac")));
        assert!(!set.accepts(OsStr::new("mp3")));

        assert!(ExtensionSet::Any.accepts(OsStr::new("README")));
        assert_eq!(ExtensionSet::parse(["mp3", "*"]).unwrap(), ExtensionSet::Any);
    }

    #[test]
    fn test_empty_extension_list() {
        assert!(matches!(
            ExtensionSet::parse([",", " "]),
            Err(ConfigError::EmptyExtensionList)
        ));
    }

    #[test]
    fn test_extension_items_split_on_commas() {
        assert_eq!(
            ExtensionSet::parse(["mp3,.FLAC", " ogg ,"]).unwrap(),
            ExtensionSet::Only(vec!["mp3".into(), "flac".into(), "ogg".into()])
        );
        assert_eq!(ExtensionSet::parse(["mp3,*"]).unwrap(), ExtensionSet::Any);
    }

    #[test]
    fn test_no_criteria_rejected() {
        let args = parse(&["-r", "music"]);
        assert!(matches!(
            ScanConfig::from_args(args),
            Err(ConfigError::NoCriteria)
        ));

        // An empty value is not a constraint
        let args = parse(&["--artist", "", "music"]);
        assert!(matches!(
            ScanConfig::from_args(args),
            Err(ConfigError::NoCriteria)
        ));
    }

    #[test]
    fn test_invalid_worker_count() {
        let args = parse(&["--year", "2013", "-w", "0", "music"]);
        assert!(matches!(
            ScanConfig::from_args(args),
            Err(ConfigError::InvalidWorkerCount { count: 0, .. })
        ));
    }

    #[test]
    fn test_flags() {
        let args = parse(&[
            "--artist", "A", "-r", "-i", "--fail-fast", "-d", "3", "--abs", "music",
        ]);
        let config = ScanConfig::from_args(args).unwrap();
        assert!(config.criteria.recursive);
        assert!(config.criteria.ignore_case);
        assert_eq!(config.error_policy, ErrorPolicy::Abort);
        assert_eq!(config.max_depth, Some(3));
        assert!(config.absolute_base.is_some());
    }

    #[test]
    fn test_exclude_pattern() {
        let args = parse(&["--artist", "A", "--exclude", r"\.Trash", "music"]);
        let config = ScanConfig::from_args(args).unwrap();

        assert!(config.is_excluded(Path::new("/home/u/.Trash/song.mp3")));
        assert!(!config.is_excluded(Path::new("/home/u/Music/song.mp3")));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let args = parse(&["--artist", "A", "--exclude", "(", "music"]);
        assert!(matches!(
            ScanConfig::from_args(args),
            Err(ConfigError::InvalidExcludePattern { .. })
        ));
    }

    #[test]
    fn test_within_depth() {
        let mut config = ScanConfig::new(vec![], MatchCriteria::default());
        assert!(config.within_depth(100));

        config.max_depth = Some(1);
        assert!(config.within_depth(0));
        assert!(config.within_depth(1));
        assert!(!config.within_depth(2));
    }
}
