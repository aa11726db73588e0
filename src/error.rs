//! Error types for dirsync
//!
//! Every failure the synchronizer can report is a [`SyncError`]. Errors are
//! grouped by how far they reach: setup errors abort the whole run, task
//! errors stay inside the worker that hit them, and close errors are only
//! reported.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// How far an error is allowed to propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the run before any copy task is dispatched
    Fatal,
    /// Local to one copy task; siblings and the run outcome are unaffected
    Task,
    /// Reported only, never changes an outcome
    BestEffort,
}

/// Main error type for dirsync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid command line arguments
    #[error("{0}")]
    Argument(String),

    /// A path given as a directory is not one
    #[error("Not a directory")]
    NotADirectory(PathBuf),

    /// Source and destination resolve to the same real path
    #[error("Can not sync directory with itself")]
    SameDirectory(PathBuf),

    /// A path could not be inspected or resolved
    #[error("{source}")]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be opened or read
    #[error("{source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source file could not be opened
    #[error("{source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination file already exists
    #[error("{source}")]
    DestExists {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination file could not be created for another reason
    #[error("{source}")]
    DestCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the source failed mid-copy
    #[error("{source} (after {written} bytes)")]
    Read {
        path: PathBuf,
        written: u64,
        #[source]
        source: std::io::Error,
    },

    /// Writing the destination failed mid-copy
    #[error("{source} (after {written} bytes)")]
    Write {
        path: PathBuf,
        written: u64,
        #[source]
        source: std::io::Error,
    },

    /// Source permission bits could not be read
    #[error("{source}")]
    Mode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker could not be started for a task
    #[error("Failed to start worker: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Closing a file handle failed
    #[error("{source}")]
    Close {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Create an argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Classify the error by propagation reach
    pub fn severity(&self) -> Severity {
        match self {
            Self::Argument(_)
            | Self::NotADirectory(_)
            | Self::SameDirectory(_)
            | Self::PathError { .. }
            | Self::List { .. } => Severity::Fatal,
            Self::SourceOpen { .. }
            | Self::DestExists { .. }
            | Self::DestCreate { .. }
            | Self::Read { .. }
            | Self::Write { .. }
            | Self::Mode { .. }
            | Self::Spawn { .. } => Severity::Task,
            Self::Close { .. } => Severity::BestEffort,
        }
    }

    /// Check if this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Classify a failed exclusive create of the destination
    pub fn dest_create(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::AlreadyExists {
            Self::DestExists { path, source }
        } else {
            Self::DestCreate { path, source }
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Argument(_) => None,
            // Reported without a path, matching the CLI's message format
            Self::SameDirectory(_) => None,
            Self::NotADirectory(path)
            | Self::PathError { path, .. }
            | Self::List { path, .. }
            | Self::SourceOpen { path, .. }
            | Self::DestExists { path, .. }
            | Self::DestCreate { path, .. }
            | Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::Mode { path, .. }
            | Self::Spawn { path, .. }
            | Self::Close { path, .. } => Some(path),
        }
    }
}

/// Result type alias for dirsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Extension trait for turning `std::io::Result` into a [`SyncError`]
pub trait IoResultExt<T> {
    /// Map the error with a variant constructor that takes a path and source
    fn or_sync(
        self,
        path: impl Into<PathBuf>,
        variant: fn(PathBuf, std::io::Error) -> SyncError,
    ) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn or_sync(
        self,
        path: impl Into<PathBuf>,
        variant: fn(PathBuf, std::io::Error) -> SyncError,
    ) -> Result<T> {
        self.map_err(|e| variant(path.into(), e))
    }
}

macro_rules! ctor {
    ($name:ident, $variant:ident) => {
        #[doc = concat!("Constructor for [`SyncError::", stringify!($variant), "`]")]
        pub fn $name(path: PathBuf, source: std::io::Error) -> Self {
            Self::$variant { path, source }
        }
    };
}

impl SyncError {
    ctor!(path_error, PathError);
    ctor!(list, List);
    ctor!(source_open, SourceOpen);
    ctor!(mode, Mode);
    ctor!(spawn, Spawn);
    ctor!(close, Close);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_severity_classification() {
        let fatal = SyncError::list(PathBuf::from("/src"), Error::from(ErrorKind::NotFound));
        assert!(fatal.is_fatal());

        let task = SyncError::source_open(PathBuf::from("/src/a"), Error::from(ErrorKind::PermissionDenied));
        assert_eq!(task.severity(), Severity::Task);

        let close = SyncError::close(PathBuf::from("/dst/a"), Error::from(ErrorKind::Other));
        assert_eq!(close.severity(), Severity::BestEffort);
    }

    #[test]
    fn test_dest_create_classification() {
        let exists = SyncError::dest_create(PathBuf::from("/dst/a"), Error::from(ErrorKind::AlreadyExists));
        assert!(matches!(exists, SyncError::DestExists { .. }));

        let denied = SyncError::dest_create(PathBuf::from("/dst/a"), Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(denied, SyncError::DestCreate { .. }));
        assert_eq!(denied.severity(), Severity::Task);
    }

    #[test]
    fn test_or_sync_attaches_path() {
        let res: std::io::Result<()> = Err(Error::from(ErrorKind::NotFound));
        let err = res.or_sync("/missing", SyncError::mode).unwrap_err();
        assert_eq!(err.path(), Some(Path::new("/missing")));
        assert!(matches!(err, SyncError::Mode { .. }));
    }

    #[test]
    fn test_same_directory_has_no_reported_path() {
        let err = SyncError::SameDirectory(PathBuf::from("/a"));
        assert!(err.path().is_none());
        assert_eq!(err.to_string(), "Can not sync directory with itself");
    }

    #[test]
    fn test_write_error_reports_progress() {
        let err = SyncError::Write {
            path: PathBuf::from("/dst/a"),
            written: 1024,
            source: Error::from(ErrorKind::Other),
        };
        assert_eq!(err.severity(), Severity::Task);
        assert!(err.to_string().contains("after 1024 bytes"));
    }
}
