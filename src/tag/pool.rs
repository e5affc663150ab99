//! Run-scoped pool of tag handles
//!
//! Handles are kept in a bounded crossbeam channel, which acquires and
//! releases without a global lock. An empty pool allocates a fresh handle
//! and a full pool drops the returned one, so callers never block.

use crate::tag::reader::TagHandle;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Pool usage counters
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Handles created because the pool was empty
    pub allocated: AtomicU64,

    /// Handles taken from the pool
    pub reused: AtomicU64,
}

impl PoolStats {
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }
}

/// Pool of reusable tag handles
#[derive(Debug)]
pub struct TagPool {
    sender: Sender<TagHandle>,
    receiver: Receiver<TagHandle>,
    stats: PoolStats,
}

impl TagPool {
    /// Create a pool holding at most `capacity` idle handles
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            stats: PoolStats::default(),
        }
    }

    /// Take a handle, allocating one if none is idle
    ///
    /// The handle goes back to the pool when the guard is dropped.
    pub fn acquire(&self) -> PooledTag<'_> {
        let handle = match self.receiver.try_recv() {
            Ok(handle) => {
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                handle
            }
            Err(_) => {
                self.stats.allocated.fetch_add(1, Ordering::Relaxed);
                TagHandle::new()
            }
        };

        PooledTag { handle, pool: self }
    }

    /// Number of idle handles
    pub fn idle(&self) -> usize {
        self.receiver.len()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    fn release(&self, mut handle: TagHandle) {
        handle.trim();
        // Full pool: let the handle drop
        let _ = self.sender.try_send(handle);
    }
}

/// A pooled tag handle with automatic return to the pool on drop
pub struct PooledTag<'a> {
    handle: TagHandle,
    pool: &'a TagPool,
}

impl Deref for PooledTag<'_> {
    type Target = TagHandle;

    fn deref(&self) -> &TagHandle {
        &self.handle
    }
}

impl DerefMut for PooledTag<'_> {
    fn deref_mut(&mut self) -> &mut TagHandle {
        &mut self.handle
    }
}

impl Drop for PooledTag<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.handle));
    }
}
