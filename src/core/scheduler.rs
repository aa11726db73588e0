//! Bounded worker pool
//!
//! Every copy task runs on its own named thread. A bounded channel holding
//! one token per running task acts as the counting semaphore: `submit`
//! pushes a token before spawning and blocks when the channel is full, and
//! the worker takes a token back out when it finishes, however it finishes.

use crate::fs::FileEntry;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A single copy task
#[derive(Debug, Clone)]
pub struct CopyTask {
    /// Task ID, unique within a run
    pub id: u64,
    /// Source file entry
    pub entry: FileEntry,
    /// Destination directory
    pub dest_dir: PathBuf,
}

impl CopyTask {
    /// Create a new copy task
    pub fn new(id: u64, entry: FileEntry, dest_dir: PathBuf) -> Self {
        Self { id, entry, dest_dir }
    }
}

/// Worker pool statistics
///
/// Counters only; task outcomes are never collected here.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Tasks handed to `submit` that got a slot
    pub submitted: AtomicU64,
    /// Tasks that released their slot, including failed spawns
    pub finished: AtomicU64,
    /// Tasks whose worker thread could not be started
    pub spawn_failures: AtomicU64,
    /// Tasks currently holding a slot
    pub in_flight: AtomicUsize,
    /// Highest `in_flight` value observed
    pub peak_in_flight: AtomicUsize,
}

impl PoolStats {
    /// Current number of running tasks
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tasks that ran at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Tasks that got a slot
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Tasks that released their slot
    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Slot held by one task; released on drop
struct Slot {
    tokens: Receiver<()>,
    stats: Arc<PoolStats>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.stats.finished.fetch_add(1, Ordering::SeqCst);
        // The token this slot pushed is still queued, so this never blocks
        let _ = self.tokens.try_recv();
    }
}

/// Runs at most `limit` tasks at once, one thread per task
pub struct WorkerPool {
    tokens_tx: Sender<()>,
    tokens_rx: Receiver<()>,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Create a pool running at most `limit` tasks concurrently
    ///
    /// The token channel is allocated up front with room for `limit` tokens,
    /// so callers should not pass a limit larger than the work they have.
    pub fn new(limit: usize) -> Self {
        let (tokens_tx, tokens_rx) = bounded(limit.max(1));

        Self {
            tokens_tx,
            tokens_rx,
            handles: Vec::new(),
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Start `job` on a new worker thread, waiting for a free slot first
    ///
    /// Returns once the worker has been started; it does not wait for the
    /// job. If the thread cannot be spawned the slot is released and the
    /// error returned.
    pub fn submit<F>(&mut self, id: u64, job: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.reap();

        // Blocks while `limit` tokens are queued
        self.tokens_tx
            .send(())
            .map_err(|_| std::io::Error::other("worker pool closed"))?;

        self.stats.submitted.fetch_add(1, Ordering::SeqCst);
        let running = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let slot = Slot {
            tokens: self.tokens_rx.clone(),
            stats: Arc::clone(&self.stats),
        };

        let spawned = thread::Builder::new()
            .name(format!("dirsync-worker-{}", id))
            .spawn(move || {
                let _slot = slot;
                job();
            });

        match spawned {
            Ok(handle) => {
                tracing::debug!("Dispatched task {} ({} in flight)", id, running);
                self.handles.push(handle);
                Ok(())
            }
            Err(e) => {
                // The closure, and the slot inside it, were dropped by spawn
                self.stats.spawn_failures.fetch_add(1, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Wait for every submitted task to finish
    pub fn drain(&mut self) {
        for handle in self.handles.drain(..) {
            join_worker(handle);
        }
        tracing::debug!(
            "Worker pool drained: {} tasks, peak {} concurrent",
            self.stats.finished(),
            self.stats.peak_in_flight()
        );
    }

    /// Join workers that have already exited
    fn reap(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) =
            self.handles.drain(..).partition(|h| h.is_finished());
        self.handles = running;
        for handle in done {
            join_worker(handle);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.drain();
    }
}

fn join_worker(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    if handle.join().is_err() {
        tracing::error!("{} panicked", name);
    }
}
