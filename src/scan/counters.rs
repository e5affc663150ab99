//! Run-wide counters
//!
//! `total` and `found` are the only values written by more than one task.
//! Both are plain atomic increments; the final values are read after the
//! worker scope has joined.

use std::sync::atomic::{AtomicU64, Ordering};

/// Totals for one scan run
#[derive(Debug, Default)]
pub struct Counters {
    /// Non-directory entries observed, before any filtering
    total: AtomicU64,

    /// Entries that passed the filter and matched
    found: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub total: u64,
    pub found: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-directory entry
    pub fn record_entry(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a match; the entry must already have been recorded
    pub fn record_match(&self) {
        // Release pairs with the Acquire in snapshot(): a reader that sees
        // this match also sees the entry increment that preceded it.
        self.found.fetch_add(1, Ordering::Release);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn found(&self) -> u64 {
        self.found.load(Ordering::Acquire)
    }

    /// Read both counters; `found <= total` holds even mid-run
    pub fn snapshot(&self) -> CounterSnapshot {
        let found = self.found();
        let total = self.total();
        CounterSnapshot { total, found }
    }
}
