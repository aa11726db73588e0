//! Main sync engine
//!
//! Lists both directories, diffs them by basename and hands one copy task
//! per missing file to the [`WorkerPool`]. Listing failures abort the run
//! before anything is dispatched. Failures inside a task are reported by
//! that task and go no further.

use crate::config::SyncConfig;
use crate::core::{CopyTask, WorkerPool};
use crate::error::{Result, SyncError};
use crate::fs::{creation_mode, list_dir, CopyStats, FileCopier, NameSet};
use crate::progress::Reporter;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work decided for one run, before any copy starts
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// One task per source file missing from the destination, in listing order
    pub tasks: Vec<CopyTask>,
    /// Regular files found in the source
    pub source_files: usize,
    /// Regular files found in the destination
    pub dest_files: usize,
    /// Source files skipped because the name already exists
    pub skipped: usize,
    /// Combined size of the files to copy, as listed
    pub pending_bytes: u64,
}

/// Sync run summary
///
/// Counts work handed out, not work that succeeded: task outcomes are
/// reported by the tasks themselves.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    /// Regular files found in the source
    pub source_files: usize,
    /// Regular files found in the destination
    pub dest_files: usize,
    /// Source files skipped because the name already exists
    pub skipped: usize,
    /// Copy tasks started
    pub dispatched: u64,
    /// Tasks whose worker could not be started
    pub spawn_failures: u64,
    /// Highest number of tasks that ran at once
    pub peak_concurrency: usize,
    /// Total duration
    pub duration: Duration,
}

/// Main sync engine
pub struct SyncEngine {
    /// Configuration
    config: SyncConfig,
    /// File copier
    copier: FileCopier,
    /// Output for task results
    reporter: Arc<Reporter>,
}

impl SyncEngine {
    /// Create a new sync engine reporting under the `dirsync` label
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            copier: FileCopier::new(),
            reporter: Arc::new(Reporter::new(env!("CARGO_PKG_NAME"))),
        }
    }

    /// Set the reporter
    pub fn with_reporter(mut self, reporter: Arc<Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Get the reporter
    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// Validate, plan and execute one sync
    pub fn run(&self) -> Result<SyncSummary> {
        let plan = self.plan()?;
        Ok(self.execute(plan))
    }

    /// Validate the configuration, snapshot both directories and diff them
    pub fn plan(&self) -> Result<SyncPlan> {
        self.config.validate()?;

        let source = list_dir(&self.config.source)?;
        let dest = list_dir(&self.config.destination)?;
        let names = NameSet::from_snapshot(&dest);

        let mut tasks = Vec::new();
        let mut skipped = 0;
        let mut pending_bytes = 0u64;

        for entry in &source {
            if names.contains_entry(entry) {
                tracing::debug!("Skipping {}: name exists in destination", entry.path.display());
                skipped += 1;
                continue;
            }
            let id = tasks.len() as u64;
            pending_bytes += entry.size;
            tasks.push(CopyTask::new(id, entry.clone(), self.config.destination.clone()));
        }

        tracing::info!(
            "{} source files, {} destination files, {} to copy ({})",
            source.len(),
            dest.len(),
            tasks.len(),
            humansize::format_size(pending_bytes, humansize::BINARY)
        );

        Ok(SyncPlan {
            tasks,
            source_files: source.len(),
            dest_files: dest.len(),
            skipped,
            pending_bytes,
        })
    }

    /// Run every task in `plan` on the worker pool and wait for all of them
    pub fn execute(&self, plan: SyncPlan) -> SyncSummary {
        let start = Instant::now();
        // Never more tasks in flight than there are tasks
        let limit = self.config.max_concurrency.min(plan.tasks.len()).max(1);
        let mut pool = WorkerPool::new(limit);

        for task in plan.tasks {
            let id = task.id;
            let path = task.entry.path.clone();
            let copier = self.copier.clone();
            let reporter = Arc::clone(&self.reporter);

            let submitted = pool.submit(id, move || {
                // Outcome already reported; nothing flows back to the run
                let _ = run_copy_task(&task, &copier, &reporter);
            });

            if let Err(e) = submitted {
                self.reporter.error(&SyncError::spawn(path, e));
            }
        }

        pool.drain();
        self.reporter.log_totals();

        let stats = pool.stats();
        let spawn_failures = stats.spawn_failures.load(std::sync::atomic::Ordering::SeqCst);

        SyncSummary {
            source_files: plan.source_files,
            dest_files: plan.dest_files,
            skipped: plan.skipped,
            dispatched: stats.submitted() - spawn_failures,
            spawn_failures,
            peak_concurrency: stats.peak_in_flight(),
            duration: start.elapsed(),
        }
    }
}

/// Copy one file and report the outcome
///
/// The creation mode is read from the source first; if that fails the
/// destination is never created. Close failures are reported separately
/// and do not change the returned result.
pub fn run_copy_task(task: &CopyTask, copier: &FileCopier, reporter: &Reporter) -> Result<CopyStats> {
    let source = &task.entry.path;

    let result = creation_mode(source).and_then(|mode| {
        let outcome = copier.copy_into(source, &task.dest_dir, mode);
        for err in &outcome.close_errors {
            reporter.error(err);
        }
        outcome.result
    });

    match &result {
        Ok(stats) => {
            tracing::debug!(
                "Task {} copied {} in {:.2?}",
                task.id,
                source.display(),
                stats.duration
            );
            reporter.copied(task.id, source, stats.bytes_copied);
        }
        Err(e) => {
            tracing::debug!("Task {} failed for {}: {}", task.id, source.display(), e);
            reporter.error(e);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CapturedOutput;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_test_structure(dir: &Path) {
        File::create(dir.join("tiny.txt")).unwrap()
            .write_all(b"tiny").unwrap();

        let mut small = File::create(dir.join("small.bin")).unwrap();
        small.write_all(&vec![0xABu8; 10 * 1024]).unwrap();

        let data: Vec<u8> = (0..crate::fs::COPY_BUF_SIZE * 4 + 17).map(|i| (i % 253) as u8).collect();
        File::create(dir.join("large.bin")).unwrap()
            .write_all(&data).unwrap();

        File::create(dir.join("empty")).unwrap();

        std::fs::create_dir_all(dir.join("subdir")).unwrap();
        File::create(dir.join("subdir/nested.txt")).unwrap()
            .write_all(b"nested").unwrap();
    }

    fn engine(src: &Path, dst: &Path, limit: usize) -> (SyncEngine, CapturedOutput) {
        let (reporter, output) = Reporter::capture("dirsync");
        let engine = SyncEngine::new(SyncConfig::new(src, dst, limit))
            .with_reporter(Arc::new(reporter));
        (engine, output)
    }

    fn assert_same_content(a: &Path, b: &Path) {
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap(), "{} != {}", a.display(), b.display());
    }

    #[test]
    fn test_copies_missing_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        create_test_structure(src.path());

        let (engine, output) = engine(src.path(), dst.path(), 2);
        let summary = engine.run().unwrap();

        assert_eq!(summary.source_files, 4);
        assert_eq!(summary.dispatched, 4);
        for name in ["tiny.txt", "small.bin", "large.bin", "empty"] {
            assert_same_content(&src.path().join(name), &dst.path().join(name));
        }
        assert!(!dst.path().join("subdir").exists());
        assert_eq!(output.stdout().lines().count(), 4);
        assert!(output.stderr().is_empty());
    }

    #[test]
    fn test_existing_names_are_never_touched() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        create_test_structure(src.path());
        std::fs::write(dst.path().join("tiny.txt"), b"different content").unwrap();

        let (engine, _output) = engine(src.path(), dst.path(), 2);
        let summary = engine.run().unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.dispatched, 3);
        assert_eq!(std::fs::read(dst.path().join("tiny.txt")).unwrap(), b"different content");
    }

    #[test]
    fn test_second_run_copies_nothing() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        create_test_structure(src.path());

        let (first, _) = engine(src.path(), dst.path(), 3);
        first.run().unwrap();

        let (second, output) = engine(src.path(), dst.path(), 3);
        let summary = second.run().unwrap();

        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.skipped, 4);
        assert!(output.stdout().is_empty());
    }

    #[test]
    fn test_late_collision_fails_only_that_task() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        create_test_structure(src.path());

        let (engine, output) = engine(src.path(), dst.path(), 2);
        let plan = engine.plan().unwrap();
        assert_eq!(plan.tasks.len(), 4);
        let expected: u64 = ["tiny.txt", "small.bin", "large.bin", "empty"]
            .iter()
            .map(|name| std::fs::metadata(src.path().join(name)).unwrap().len())
            .sum();
        assert_eq!(plan.pending_bytes, expected);

        // Appears after the snapshot was taken
        std::fs::write(dst.path().join("small.bin"), b"late arrival").unwrap();

        let summary = engine.execute(plan);

        assert_eq!(summary.dispatched, 4);
        assert_eq!(std::fs::read(dst.path().join("small.bin")).unwrap(), b"late arrival");
        for name in ["tiny.txt", "large.bin", "empty"] {
            assert_same_content(&src.path().join(name), &dst.path().join(name));
        }

        let stderr = output.stderr();
        assert_eq!(stderr.lines().count(), 1);
        assert!(stderr.contains("small.bin"));
        assert_eq!(engine.reporter().failures(), 1);
    }

    #[test]
    fn test_concurrency_stays_within_limit() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        for i in 0..40 {
            std::fs::write(src.path().join(format!("file_{}.dat", i)), vec![i as u8; 50_000]).unwrap();
        }

        let (engine, _) = engine(src.path(), dst.path(), 3);
        let summary = engine.run().unwrap();

        assert_eq!(summary.dispatched, 40);
        assert!(summary.peak_concurrency <= 3);
        assert!(summary.peak_concurrency >= 1);
        assert_eq!(std::fs::read_dir(dst.path()).unwrap().count(), 40);
    }

    #[test]
    fn test_huge_concurrency_limit() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("only.txt"), b"one file").unwrap();

        let limit = crate::config::parse_concurrency("1000000000000").unwrap();
        let (engine, output) = engine(src.path(), dst.path(), limit);
        let summary = engine.run().unwrap();

        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.peak_concurrency, 1);
        assert_same_content(&src.path().join("only.txt"), &dst.path().join("only.txt"));
        assert_eq!(output.stdout().lines().count(), 1);
    }

    #[test]
    fn test_same_directory_rejected_before_listing() {
        let dir = TempDir::new().unwrap();
        create_test_structure(dir.path());

        let (engine, output) = engine(dir.path(), &dir.path().join("."), 2);
        let err = engine.run().unwrap_err();

        assert!(matches!(err, SyncError::SameDirectory(_)));
        assert!(output.stdout().is_empty());
    }

    #[test]
    fn test_unreadable_destination_is_fatal() {
        let src = TempDir::new().unwrap();
        create_test_structure(src.path());
        let missing = src.path().join("no_such_dir");

        let (engine, output) = engine(src.path(), &missing, 2);
        let err = engine.run().unwrap_err();

        assert!(err.is_fatal());
        assert!(output.stdout().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_follow_source() {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let script = src.path().join("run.sh");
        std::fs::write(&script, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let secret = src.path().join("secret");
        std::fs::write(&secret, b"hush").unwrap();
        std::fs::set_permissions(&secret, std::fs::Permissions::from_mode(0o600)).unwrap();

        let (engine, _) = engine(src.path(), dst.path(), 2);
        engine.run().unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dst.path().join("run.sh")), 0o755);
        assert_eq!(mode(&dst.path().join("secret")), 0o600);
    }
}
