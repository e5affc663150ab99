//! Parallel tag scanner
//!
//! Every directory listing and every directory entry is its own
//! [`ScanTask`]. Tasks live in per-worker deques with work stealing; a
//! directory task pushes one entry task per entry, and an entry task that
//! turns out to be a directory pushes a new directory task.
//!
//! ```text
//! Injector (roots)
//! │
//! ├── Worker 0: pop task → list dir / stat + match file → push children
//! ├── Worker 1: pop task → list dir / stat + match file → push children
//! └── Worker N: pop task → list dir / stat + match file → push children
//! │
//! ├── Match channel   → Reporter thread → stdout
//! └── Failure channel → collected after the workers join
//! ```
//!
//! The run is over when the pending set drains. Workers exit on their own
//! once it does, and the thread scope is the join barrier.

use crate::config::{ErrorPolicy, ScanConfig};
use crate::error::{Result, ScanError, TagrepError, WorkerError};
use crate::scan::counters::Counters;
use crate::scan::filter::{Eligibility, EntryFilter};
use crate::scan::task::{LocalQueue, ScanTask, TaskGuard, TaskQueue};
use crate::tag::{Matcher, TagMatcher};
use crossbeam_channel::{unbounded, Sender};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Spins before an idle worker starts sleeping
const MAX_IDLE_SPINS: u32 = 1000;

/// Sleep between polls once a worker is idle
const IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Interval between progress callbacks
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a completed run
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Non-directory entries observed
    pub total: u64,

    /// Entries that matched
    pub found: u64,

    /// Files skipped because they could not be stat'ed, opened or read
    pub skipped: u64,

    /// Directories that could not be listed
    pub failures: Vec<ScanError>,

    /// Wall time of the run
    pub duration: Duration,

    /// True only when every registered task ran to completion
    pub completed: bool,
}

impl ScanSummary {
    /// True when at least one subtree was lost to a listing failure
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    pub total: u64,
    pub found: u64,
    pub pending: usize,
    pub elapsed: Duration,
}

impl ScanProgress {
    pub fn entries_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }
}

/// Scans directory trees for files whose tags match
pub struct Scanner<M: Matcher = TagMatcher> {
    config: ScanConfig,
    matcher: M,
    shutdown: Arc<AtomicBool>,
}

impl Scanner<TagMatcher> {
    /// Create a scanner using the ID3v2 matcher
    pub fn new(config: ScanConfig) -> Self {
        let matcher = TagMatcher::new(config.pool_size);
        Self::with_matcher(config, matcher)
    }
}

impl<M: Matcher> Scanner<M> {
    /// Create a scanner with a custom matcher
    pub fn with_matcher(config: ScanConfig, matcher: M) -> Self {
        Self {
            config,
            matcher,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that cancels the run when set (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Scan every configured root, sending matched paths to `matches`
    pub fn run(&self, matches: &Sender<PathBuf>) -> Result<ScanSummary> {
        self.run_roots(&self.config.roots, matches, None)
    }

    /// Scan a single root, ignoring the configured roots
    pub fn scan(&self, root: &Path, matches: &Sender<PathBuf>) -> Result<ScanSummary> {
        self.run_roots(&[root.to_path_buf()], matches, None)
    }

    /// Like [`Scanner::run`], calling `callback` every 100ms while the scan runs
    pub fn run_with_progress<F>(&self, matches: &Sender<PathBuf>, callback: F) -> Result<ScanSummary>
    where
        F: Fn(ScanProgress) + Sync,
    {
        self.run_roots(&self.config.roots, matches, Some(&callback))
    }

    /// Scan every configured root and collect the matches in completion order
    pub fn collect(&self) -> Result<(ScanSummary, Vec<PathBuf>)> {
        let (tx, rx) = unbounded();
        let summary = self.run(&tx)?;
        drop(tx);
        Ok((summary, rx.into_iter().collect()))
    }

    fn run_roots(
        &self,
        roots: &[PathBuf],
        matches: &Sender<PathBuf>,
        progress: Option<&(dyn Fn(ScanProgress) + Sync)>,
    ) -> Result<ScanSummary> {
        let start = Instant::now();

        if self.config.criteria.is_empty() {
            debug!("No match criteria configured, skipping traversal");
            return Ok(ScanSummary {
                completed: true,
                duration: start.elapsed(),
                ..Default::default()
            });
        }

        let worker_count = self.config.worker_count.max(1);
        let (queue, locals) = TaskQueue::new(worker_count);
        let (failure_tx, failure_rx) = unbounded();

        let run = Run {
            config: &self.config,
            matcher: &self.matcher,
            filter: EntryFilter::new(&self.config.criteria),
            counters: Counters::new(),
            skipped: AtomicU64::new(0),
            queue,
            shutdown: &self.shutdown,
            abort: AtomicBool::new(false),
            failures: failure_tx,
            matches,
        };

        for root in roots {
            run.queue.seed(ScanTask::root(root.clone()));
        }

        info!(
            roots = roots.len(),
            workers = worker_count,
            recursive = self.config.criteria.recursive,
            "Starting scan"
        );

        let done = AtomicBool::new(false);
        let worker_error = thread::scope(|s| {
            let mut handles = Vec::with_capacity(worker_count);
            let mut init_error = None;

            for (id, local) in locals.into_iter().enumerate() {
                let run = &run;
                let spawned = thread::Builder::new()
                    .name(format!("scanner-{}", id))
                    .spawn_scoped(s, move || run.worker_loop(LocalQueue::new(id, local, &run.queue)));

                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(e) => {
                        // Stop the workers already running
                        run.abort.store(true, Ordering::SeqCst);
                        init_error = Some(WorkerError::InitFailed {
                            id,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }

            if let Some(callback) = progress {
                let run = &run;
                let done = &done;
                s.spawn(move || loop {
                    callback(run.progress(start.elapsed()));
                    if done.load(Ordering::Relaxed) {
                        break;
                    }
                    thread::sleep(PROGRESS_INTERVAL);
                });
            }

            let mut worker_error = init_error;
            for (id, handle) in handles {
                if handle.join().is_err() && worker_error.is_none() {
                    worker_error = Some(WorkerError::Panicked {
                        id,
                        message: "Worker thread panicked".into(),
                    });
                }
            }
            done.store(true, Ordering::Relaxed);
            worker_error
        });

        if let Some(e) = worker_error {
            return Err(e.into());
        }

        let mut failures: Vec<ScanError> = failure_rx.try_iter().collect();
        if run.abort.load(Ordering::SeqCst) && !failures.is_empty() {
            return Err(TagrepError::Aborted {
                source: failures.remove(0),
            });
        }

        self.matcher.finish();
        let counts = run.counters.snapshot();
        let summary = ScanSummary {
            total: counts.total,
            found: counts.found,
            skipped: run.skipped.load(Ordering::Relaxed),
            failures,
            duration: start.elapsed(),
            completed: run.queue.pending().is_drained(),
        };

        info!(
            total = summary.total,
            found = summary.found,
            skipped = summary.skipped,
            failures = summary.failures.len(),
            tasks = run.queue.stats().spawned(),
            stolen = run.queue.stats().stolen(),
            "Scan finished"
        );

        Ok(summary)
    }
}

/// State shared by the workers of a single run
struct Run<'a, M: Matcher> {
    config: &'a ScanConfig,
    matcher: &'a M,
    filter: EntryFilter<'a>,
    counters: Counters,
    skipped: AtomicU64,
    queue: TaskQueue,
    shutdown: &'a AtomicBool,
    abort: AtomicBool,
    failures: Sender<ScanError>,
    matches: &'a Sender<PathBuf>,
}

impl<M: Matcher> Run<'_, M> {
    fn should_stop(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed) || self.abort.load(Ordering::Relaxed)
    }

    fn progress(&self, elapsed: Duration) -> ScanProgress {
        let counts = self.counters.snapshot();
        ScanProgress {
            total: counts.total,
            found: counts.found,
            pending: self.queue.pending().len(),
            elapsed,
        }
    }

    fn worker_loop(&self, local: LocalQueue<'_>) {
        let _panic_guard = PanicGuard(&self.abort);
        debug!("Worker {} started", local.id());

        let mut idle_spins = 0;
        loop {
            if self.should_stop() {
                break;
            }

            match local.next() {
                Some(task) => {
                    idle_spins = 0;
                    // A task popped after a stop stays pending, so the run is not drained
                    if self.should_stop() {
                        break;
                    }
                    let _task = TaskGuard::new(self.queue.pending());
                    self.process(&local, task);
                }
                None => {
                    if self.queue.pending().is_drained() {
                        break;
                    }

                    idle_spins += 1;
                    if idle_spins > MAX_IDLE_SPINS {
                        thread::sleep(IDLE_SLEEP);
                        idle_spins = 0;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            }
        }

        debug!("Worker {} finished", local.id());
    }

    fn process(&self, local: &LocalQueue<'_>, task: ScanTask) {
        match task {
            ScanTask::Dir { path, depth } => self.scan_dir(local, &path, depth),
            ScanTask::Entry { path, depth } => self.visit_entry(local, path, depth),
        }
    }

    /// List a directory and spawn one task per entry
    fn scan_dir(&self, local: &LocalQueue<'_>, dir: &Path, depth: usize) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) => return self.listing_failed(dir, source),
        };

        let mut spawned = 0usize;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    self.listing_failed(dir, source);
                    break;
                }
            };

            let path = entry.path();
            if self.config.is_excluded(&path) {
                trace!("{}: excluded", path.display());
                continue;
            }

            local.spawn(ScanTask::Entry {
                path,
                depth: depth + 1,
            });
            spawned += 1;
        }

        trace!("{}: {} entries", dir.display(), spawned);
    }

    /// Evaluate one entry: descend, count, filter, match
    fn visit_entry(&self, local: &LocalQueue<'_>, path: PathBuf, depth: usize) {
        // Roots are followed through symlinks, entries below them are not
        let meta = if depth == 0 {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        };
        let meta = match meta {
            Ok(meta) => meta,
            Err(source) => return self.skip(ScanError::Metadata { path, source }),
        };

        if meta.is_dir() {
            if self.config.criteria.recursive && self.config.within_depth(depth) {
                local.spawn(ScanTask::Dir { path, depth });
            }
            return;
        }

        self.counters.record_entry();

        let Some(name) = path.file_name() else {
            return;
        };
        match self.filter.check(name, meta.len()) {
            Eligibility::Eligible => {}
            rejected => {
                trace!("{}: {:?}", path.display(), rejected);
                return;
            }
        }

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(source) => return self.skip(ScanError::Open { path, source }),
        };

        match self.matcher.matches(&mut file, &self.config.criteria) {
            Ok(true) => {
                self.counters.record_match();
                if let Err(e) = self.matches.send(path) {
                    debug!("{}: reporter closed, match not printed", e.0.display());
                }
            }
            Ok(false) => {}
            Err(source) => self.skip(ScanError::Tag { path, source }),
        }
    }

    fn skip(&self, err: ScanError) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        debug!("{}", err);
    }

    fn listing_failed(&self, dir: &Path, source: io::Error) {
        let err = ScanError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };
        warn!("{}", err);

        // Queue the failure before stopping anyone, so an aborted run can report it
        let _ = self.failures.send(err);
        if self.config.error_policy == ErrorPolicy::Abort {
            self.abort.store(true, Ordering::SeqCst);
        }
    }
}

/// Stops the other workers if this one unwinds mid-task
struct PanicGuard<'a>(&'a AtomicBool);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchCriteria;
    use crate::error::TagResult;
    use std::io::Read;
    use std::sync::OnceLock;
    use tempfile::tempdir;

    /// Matches files whose contents start with the configured artist
    struct PrefixMatcher;

    impl Matcher for PrefixMatcher {
        fn matches(&self, file: &mut File, criteria: &MatchCriteria) -> TagResult<bool> {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            Ok(criteria
                .artist
                .as_deref()
                .map_or(false, |a| contents.starts_with(a)))
        }
    }

    fn config(root: &Path, recursive: bool) -> ScanConfig {
        let criteria = MatchCriteria {
            artist: Some("hit".into()),
            recursive,
            ..Default::default()
        };
        let mut config = ScanConfig::new(vec![root.to_path_buf()], criteria);
        config.worker_count = 4;
        config
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        // Pad past the size threshold
        std::fs::write(path, format!("{contents:<32}")).unwrap();
    }

    #[test]
    fn test_summary_default() {
        let summary = ScanSummary::default();
        assert_eq!(summary.total, 0);
        assert!(!summary.is_partial());
        assert!(!summary.completed);
    }

    #[test]
    fn test_progress_rate() {
        let progress = ScanProgress {
            total: 1000,
            elapsed: Duration::from_secs(10),
            ..Default::default()
        };
        assert!((progress.entries_per_second() - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_flat_scan() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");
        write(&dir.path().join("b"), "miss");
        write(&dir.path().join("sub/c"), "hit");

        let scanner = Scanner::with_matcher(config(dir.path(), false), PrefixMatcher);
        let (summary, matches) = scanner.collect().unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.found, 1);
        assert_eq!(matches, vec![dir.path().join("a")]);
        assert!(summary.completed);
    }

    #[test]
    fn test_recursive_scan() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");
        write(&dir.path().join("x/b"), "hit");
        write(&dir.path().join("x/y/z/c"), "hit");
        write(&dir.path().join("x/y/d"), "miss");

        let scanner = Scanner::with_matcher(config(dir.path(), true), PrefixMatcher);
        let (summary, mut matches) = scanner.collect().unwrap();
        matches.sort();

        assert_eq!(summary.total, 4);
        assert_eq!(summary.found, 3);
        assert_eq!(
            matches,
            vec![
                dir.path().join("a"),
                dir.path().join("x/b"),
                dir.path().join("x/y/z/c"),
            ]
        );
    }

    #[test]
    fn test_max_depth() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");
        write(&dir.path().join("x/b"), "hit");
        write(&dir.path().join("x/y/c"), "hit");

        let mut config = config(dir.path(), true);
        config.max_depth = Some(1);
        let scanner = Scanner::with_matcher(config, PrefixMatcher);
        let (summary, _) = scanner.collect().unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.found, 2);
    }

    #[test]
    fn test_small_files_counted_not_matched() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("tiny"), "hit").unwrap();
        write(&dir.path().join("big"), "hit");

        let scanner = Scanner::with_matcher(config(dir.path(), false), PrefixMatcher);
        let (summary, matches) = scanner.collect().unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.found, 1);
        assert_eq!(matches, vec![dir.path().join("big")]);
    }

    #[test]
    fn test_no_criteria_skips_traversal() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");

        let mut config = config(dir.path(), true);
        config.criteria.artist = None;
        let scanner = Scanner::with_matcher(config, PrefixMatcher);
        let (summary, matches) = scanner.collect().unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.found, 0);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_missing_root_is_partial() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");

        let mut config = config(dir.path(), false);
        config.roots.push(dir.path().join("missing"));
        let scanner = Scanner::with_matcher(config, PrefixMatcher);
        let (summary, matches) = scanner.collect().unwrap();

        assert_eq!(summary.found, 1);
        assert_eq!(matches.len(), 1);
        assert!(summary.is_partial());
        assert_eq!(summary.failures[0].path(), dir.path().join("missing"));
    }

    #[test]
    fn test_abort_policy() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");

        let mut config = config(dir.path(), false);
        config.roots.push(dir.path().join("missing"));
        config.error_policy = ErrorPolicy::Abort;
        let scanner = Scanner::with_matcher(config, PrefixMatcher);

        match scanner.collect() {
            Err(TagrepError::Aborted { source }) => assert!(source.is_subtree_failure()),
            other => panic!("expected abort, got {:?}", other.map(|(s, _)| s)),
        }
    }

    #[test]
    fn test_shutdown_before_run() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");

        let scanner = Scanner::with_matcher(config(dir.path(), false), PrefixMatcher);
        scanner.shutdown_flag().store(true, Ordering::SeqCst);
        let (summary, matches) = scanner.collect().unwrap();

        assert!(!summary.completed);
        assert_eq!(summary.total, 0);
        assert!(matches.is_empty());
    }

    /// Matches everything and cancels the run from inside its first call
    struct CancellingMatcher {
        shutdown: Arc<OnceLock<Arc<AtomicBool>>>,
    }

    impl Matcher for CancellingMatcher {
        fn matches(&self, _file: &mut File, _criteria: &MatchCriteria) -> TagResult<bool> {
            if let Some(flag) = self.shutdown.get() {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(true)
        }
    }

    #[test]
    fn test_shutdown_during_run() {
        let dir = tempdir().unwrap();
        for i in 0..100 {
            write(&dir.path().join(format!("f{i:03}")), "hit");
        }

        let shutdown = Arc::new(OnceLock::new());
        let matcher = CancellingMatcher {
            shutdown: Arc::clone(&shutdown),
        };
        let scanner = Scanner::with_matcher(config(dir.path(), false), matcher);
        shutdown.set(scanner.shutdown_flag()).unwrap();

        let (summary, matches) = scanner.collect().unwrap();

        assert!(!summary.completed);
        assert!(summary.found >= 1);
        assert!(summary.found < 100);
        assert_eq!(matches.len() as u64, summary.found);
    }

    #[test]
    fn test_shutdown_during_last_task_still_completes() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("only"), "hit");

        let shutdown = Arc::new(OnceLock::new());
        let matcher = CancellingMatcher {
            shutdown: Arc::clone(&shutdown),
        };
        let scanner = Scanner::with_matcher(config(dir.path(), false), matcher);
        shutdown.set(scanner.shutdown_flag()).unwrap();

        let (summary, matches) = scanner.collect().unwrap();

        // The flag was raised, but nothing was left to run
        assert!(scanner.shutdown_flag().load(Ordering::SeqCst));
        assert!(summary.completed);
        assert_eq!(summary.found, 1);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_file_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a");
        write(&file, "hit");

        let scanner = Scanner::with_matcher(config(dir.path(), false), PrefixMatcher);
        let (tx, rx) = unbounded();
        let summary = scanner.scan(&file, &tx).unwrap();
        drop(tx);

        assert_eq!(summary.total, 1);
        assert_eq!(summary.found, 1);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![file]);
    }

    #[test]
    fn test_progress_callback_runs() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a"), "hit");

        let scanner = Scanner::with_matcher(config(dir.path(), false), PrefixMatcher);
        let calls = AtomicU64::new(0);
        let (tx, _rx) = unbounded();
        let summary = scanner
            .run_with_progress(&tx, |_| {
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        assert_eq!(summary.found, 1);
        assert!(calls.load(Ordering::Relaxed) >= 1);
    }
}
