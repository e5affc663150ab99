//! tagrep - Parallel ID3v2 Tag Search
//!
//! Scans directory trees for audio files whose ID3v2 artist, title and
//! year fields match the given values, printing each match as soon as it
//! is found.
//!
//! # Features
//!
//! - **One Task per Entry**: every directory listing and every entry is a
//!   separate task on a work-stealing pool, so wide and deep trees spread
//!   across all workers.
//!
//! - **Exact Completion**: tasks are registered before they are queued and
//!   released after their children are registered, so the run ends exactly
//!   when the last descendant finishes.
//!
//! - **Cheap Rejection**: files too small to hold a tag, or outside the
//!   extension allow-list, are never opened; only the tag region of the
//!   remaining files is read.
//!
//! - **Subtree Failures**: an unreadable directory is reported and its
//!   siblings are still scanned, unless `--fail-fast` asks for the run to
//!   stop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Roots                                │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ seed (register, push)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Worker Threads                         │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐        ┌─────────┐   │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...   │Worker N │   │
//! │  │  deque  │  │  deque  │  │  deque  │        │  deque  │   │
//! │  └────┬────┘  └────┬────┘  └────┬────┘        └────┬────┘   │
//! │       └──── steal ─┴────────────┴──────────────────┘        │
//! │                                                             │
//! │   Dir task   → read_dir → spawn Entry task per entry        │
//! │   Entry task → stat → count → filter → open → TagMatcher    │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ matched paths
//!                               ▼
//!                    ┌──────────────────┐
//!                    │ Reporter thread  │──▶ stdout
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Every track by an artist, anywhere under ~/Music
//! tagrep --artist 'Yung Lean' -r ~/Music
//!
//! # Case-insensitive title search over mp3 files only
//! tagrep --title 'kyoto' -i -e mp3 -r ./library
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod scan;
pub mod tag;

pub use config::{CliArgs, ErrorPolicy, ExtensionSet, MatchCriteria, ScanConfig};
pub use error::{Result, ScanError, TagError, TagrepError};
pub use scan::{Reporter, ScanSummary, Scanner};
pub use tag::{Matcher, TagMatcher};
