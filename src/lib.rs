//! # dirsync - One-way Directory Sync
//!
//! dirsync copies every regular file that exists in a source directory but
//! has no file of the same name in a destination directory. It does not
//! recurse, compare contents or touch files that already exist. Each copy
//! runs on its own worker, and no more than a configured number of workers
//! run at once.
//!
//! ## Pipeline
//!
//! 1. Both directories are listed once ([`fs::list_dir`]).
//! 2. Destination names go into a [`fs::NameSet`].
//! 3. Each source file whose name is missing becomes a [`core::CopyTask`],
//!    run by the [`core::WorkerPool`].
//! 4. The task reads the source's permission bits and then copies the bytes
//!    into an exclusively created destination file ([`fs::FileCopier`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use dirsync::config::SyncConfig;
//! use dirsync::core::SyncEngine;
//!
//! let config = SyncConfig::new("/data/incoming", "/data/archive", 4);
//! let summary = SyncEngine::new(config).run().unwrap();
//!
//! println!("Dispatched {} copies, skipped {}", summary.dispatched, summary.skipped);
//! ```
//!
//! Failures of individual copies are printed by the task that hit them and
//! never turn into an error from [`core::SyncEngine::run`]. Only setup and
//! listing failures do.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod progress;

// Re-export commonly used types
pub use config::{CliArgs, SyncConfig};
pub use self::core::{SyncEngine, SyncSummary, WorkerPool};
pub use error::{Result, SyncError};
pub use progress::Reporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
