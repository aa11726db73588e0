//! Per-task output lines
//!
//! Each finished copy prints one line to stdout and each error one line to
//! stderr. The error lines are prefixed with a module label that is carried
//! by the [`Reporter`] value instead of living in global state.

use crate::error::SyncError;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Destination for one output stream
#[derive(Debug, Clone)]
enum Sink {
    Stdout,
    Stderr,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl Sink {
    fn write_line(&self, line: &str) {
        // A broken stdout/stderr must not take a worker down with it
        let _ = match self {
            Sink::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            Sink::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
            Sink::Buffer(buf) => match buf.lock() {
                Ok(mut buf) => writeln!(buf, "{}", line),
                Err(_) => Ok(()),
            },
        };
    }
}

/// Captured output of a [`Reporter`] built with [`Reporter::capture`]
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    out: Arc<Mutex<Vec<u8>>>,
    err: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    fn read(buf: &Mutex<Vec<u8>>) -> String {
        buf.lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    /// Everything written to the success stream
    pub fn stdout(&self) -> String {
        Self::read(&self.out)
    }

    /// Everything written to the error stream
    pub fn stderr(&self) -> String {
        Self::read(&self.err)
    }
}

/// Reporter for copy task results
#[derive(Debug)]
pub struct Reporter {
    /// Label printed in front of every error line
    module: String,
    /// Suppress success lines
    quiet: bool,
    out: Sink,
    err: Sink,
    /// Start time
    start_time: Instant,
    files_copied: AtomicU64,
    bytes_copied: AtomicU64,
    failures: AtomicU64,
}

impl Reporter {
    /// Create a reporter writing to stdout and stderr
    pub fn new(module: impl Into<String>) -> Self {
        Self::with_sinks(module.into(), Sink::Stdout, Sink::Stderr)
    }

    /// Create a reporter that writes into memory buffers
    pub fn capture(module: impl Into<String>) -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        let reporter = Self::with_sinks(
            module.into(),
            Sink::Buffer(Arc::clone(&captured.out)),
            Sink::Buffer(Arc::clone(&captured.err)),
        );
        (reporter, captured)
    }

    fn with_sinks(module: String, out: Sink, err: Sink) -> Self {
        Self {
            module,
            quiet: false,
            out,
            err,
            start_time: Instant::now(),
            files_copied: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Suppress per-copy success lines
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Report a finished copy
    pub fn copied(&self, worker: u64, source: &Path, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);

        if !self.quiet {
            self.out.write_line(&format!(
                "worker: {}; source: {}; bytes copied: {}",
                worker,
                source.display(),
                bytes
            ));
        }
    }

    /// Report an error, counting it as a task failure unless it is best-effort
    pub fn error(&self, err: &SyncError) {
        if err.severity() == crate::error::Severity::Task {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.message(&err.to_string(), err.path());
    }

    /// Report a free-form error message
    pub fn message(&self, message: &str, path: Option<&Path>) {
        let line = match path {
            Some(path) => format!("{}: {} {}", self.module, message, path.display()),
            None => format!("{}: {}", self.module, message),
        };
        self.err.write_line(&line);
    }

    /// Get elapsed time since the reporter was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Files reported as copied
    pub fn files_copied(&self) -> u64 {
        self.files_copied.load(Ordering::Relaxed)
    }

    /// Bytes reported as copied
    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied.load(Ordering::Relaxed)
    }

    /// Task failures reported
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Log the totals seen so far
    pub fn log_totals(&self) {
        let elapsed = self.elapsed();
        let bytes = self.bytes_copied();
        let secs = elapsed.as_secs_f64();
        let speed = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };

        tracing::info!(
            "Completed: {} files, {} in {:.1?} ({}/s), {} failed",
            self.files_copied(),
            humansize::format_size(bytes, humansize::BINARY),
            elapsed,
            humansize::format_size(speed as u64, humansize::BINARY),
            self.failures()
        );
    }
}
