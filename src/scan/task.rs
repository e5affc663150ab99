//! Scan tasks and the work-stealing queue that carries them
//!
//! Every task is registered in the [`PendingSet`] before it becomes visible
//! to any worker, and released only after its body has returned. A
//! directory task registers all of its children inside its body, so the
//! pending count cannot reach zero while any descendant is outstanding.

use crossbeam_deque::{Injector, Steal, Stealer, Worker as DequeWorker};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// One unit of concurrent work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTask {
    /// List a directory and spawn one task per entry
    Dir { path: PathBuf, depth: usize },

    /// Evaluate a single entry
    Entry { path: PathBuf, depth: usize },
}

impl ScanTask {
    /// Task for a user-supplied root
    ///
    /// Anything that is not known to be a regular file or other non-directory
    /// is treated as a directory, so an unreadable root surfaces as a
    /// listing failure.
    pub fn root(path: PathBuf) -> Self {
        match fs::metadata(&path) {
            Ok(meta) if !meta.is_dir() => ScanTask::Entry { path, depth: 0 },
            _ => ScanTask::Dir { path, depth: 0 },
        }
    }
}

/// Count of registered tasks that have not completed yet
#[derive(Debug, Default)]
pub struct PendingSet {
    count: AtomicUsize,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task that is about to be dispatched
    pub fn register(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Release one registration
    pub fn complete(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// True once every registered task has completed
    pub fn is_drained(&self) -> bool {
        self.len() == 0
    }
}

/// RAII guard releasing one pending registration when the task body ends
pub struct TaskGuard<'a> {
    pending: &'a PendingSet,
}

impl<'a> TaskGuard<'a> {
    /// Take responsibility for a task that was registered and then popped
    pub fn new(pending: &'a PendingSet) -> Self {
        Self { pending }
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.pending.complete();
    }
}

/// Statistics for the task queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Tasks registered (roots and spawned)
    pub spawned: AtomicU64,

    /// Tasks taken from another worker or the injector
    pub stolen: AtomicU64,
}

impl QueueStats {
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    pub fn stolen(&self) -> u64 {
        self.stolen.load(Ordering::Relaxed)
    }
}

/// Shared side of the queue: global injector, stealers, pending set
pub struct TaskQueue {
    injector: Injector<ScanTask>,
    stealers: Vec<Stealer<ScanTask>>,
    pending: PendingSet,
    stats: QueueStats,
}

impl TaskQueue {
    /// Create the shared queue and one local deque per worker
    pub fn new(worker_count: usize) -> (Self, Vec<DequeWorker<ScanTask>>) {
        // LIFO keeps each worker deep in its own subtree, which bounds the
        // number of queued entry tasks on wide trees
        let locals: Vec<DequeWorker<ScanTask>> =
            (0..worker_count).map(|_| DequeWorker::new_lifo()).collect();
        let stealers = locals.iter().map(DequeWorker::stealer).collect();

        let queue = Self {
            injector: Injector::new(),
            stealers,
            pending: PendingSet::new(),
            stats: QueueStats::default(),
        };
        (queue, locals)
    }

    /// Register a root task and make it available to every worker
    pub fn seed(&self, task: ScanTask) {
        self.pending.register();
        self.stats.spawned.fetch_add(1, Ordering::Relaxed);
        self.injector.push(task);
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Take work from the injector, then from any other worker
    fn steal(&self, thief: usize) -> Option<ScanTask> {
        loop {
            match self.injector.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        for (i, stealer) in self.stealers.iter().enumerate() {
            if i == thief {
                continue;
            }
            loop {
                match stealer.steal() {
                    Steal::Success(task) => {
                        self.stats.stolen.fetch_add(1, Ordering::Relaxed);
                        return Some(task);
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        None
    }
}

/// Per-worker side of the queue
pub struct LocalQueue<'a> {
    id: usize,
    local: DequeWorker<ScanTask>,
    shared: &'a TaskQueue,
}

impl<'a> LocalQueue<'a> {
    pub fn new(id: usize, local: DequeWorker<ScanTask>, shared: &'a TaskQueue) -> Self {
        Self { id, local, shared }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Register a child task, then push it where workers can reach it
    pub fn spawn(&self, task: ScanTask) {
        self.shared.pending.register();
        self.shared.stats.spawned.fetch_add(1, Ordering::Relaxed);
        self.local.push(task);
    }

    /// Next task: own deque first, then injector, then other workers
    pub fn next(&self) -> Option<ScanTask> {
        self.local.pop().or_else(|| self.shared.steal(self.id))
    }
}
