//! Error types for tagrep
//!
//! This module defines the error hierarchy for:
//! - Per-path scan failures (directory listing, metadata, open, tag read)
//! - Tag reading errors
//! - Configuration and CLI errors
//! - Worker thread errors
//!
//! Library code uses thiserror; the binary wraps these with anyhow context.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for a scan run
#[derive(Error, Debug)]
pub enum TagrepError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors outside of the traversal (output sink, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A directory listing failed while the abort-on-failure policy was active
    #[error("Scan aborted: {source}")]
    Aborted {
        #[source]
        source: ScanError,
    },
}

/// Failure attached to a single path during traversal
#[derive(Error, Debug)]
pub enum ScanError {
    /// Directory could not be listed (the whole subtree is lost)
    #[error("{}: failed to read directory: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Entry metadata could not be read
    #[error("{}: failed to stat: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File could not be opened (permissions, removed mid-scan)
    #[error("{}: failed to open: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Tag could not be read from an open file
    #[error("{}: {source}", path.display())]
    Tag {
        path: PathBuf,
        #[source]
        source: TagError,
    },
}

impl ScanError {
    /// True when this failure dropped a whole subtree rather than one file
    pub fn is_subtree_failure(&self) -> bool {
        matches!(self, ScanError::ReadDir { .. })
    }

    /// Returns the path associated with this failure
    pub fn path(&self) -> &Path {
        match self {
            ScanError::ReadDir { path, .. }
            | ScanError::Metadata { path, .. }
            | ScanError::Open { path, .. }
            | ScanError::Tag { path, .. } => path,
        }
    }
}

/// Errors from reading an ID3v2 tag out of a byte stream
#[derive(Error, Debug)]
pub enum TagError {
    /// Reading the underlying stream failed
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// Header announced more bytes than the stream holds
    #[error("truncated tag: header announced {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Tag bytes were present but could not be decoded
    #[error("malformed tag: {0}")]
    Parse(#[from] id3::Error),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// None of artist/title/year was given
    #[error("No match criteria: pass at least one of --artist, --title or --year")]
    NoCriteria,

    /// No scan roots were given
    #[error("No paths to scan")]
    NoRoots,

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid pool size
    #[error("Invalid pool size {size}: must be at least 1")]
    InvalidPoolSize { size: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Extension list contained only separators
    #[error("Extension list is empty: use '*' to accept every file")]
    EmptyExtensionList,

    /// Working directory could not be resolved for --abs
    #[error("Cannot resolve working directory: {0}")]
    WorkingDir(#[source] io::Error),
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker initialization failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Reporter thread failed or panicked
    #[error("Reporter failed: {0}")]
    Reporter(String),
}

/// Result type alias for TagrepError
pub type Result<T> = std::result::Result<T, TagrepError>;

/// Result type alias for TagError
pub type TagResult<T> = std::result::Result<T, TagError>;
