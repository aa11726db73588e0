//! Flat directory listing
//!
//! Captures the regular files sitting directly inside one directory as a
//! [`DirectorySnapshot`]. Symbolic links are followed when classifying an
//! entry, so a link to a regular file is listed while links to directories
//! and dangling links are not. Subdirectories are never descended into.

use crate::error::{Result, SyncError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A regular file found while listing a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path of the file: the listed directory joined with the entry name
    pub path: PathBuf,
    /// File size in bytes, after following symlinks
    pub size: u64,
}

impl FileEntry {
    /// Final component of the path
    pub fn file_name(&self) -> &OsStr {
        // Entries always come from a directory listing, so the name is never empty
        self.path.file_name().unwrap_or_else(|| self.path.as_os_str())
    }
}

/// Point-in-time list of the regular files in one directory
///
/// Entries keep the order the filesystem returned them in. The snapshot is
/// never refreshed after it is taken.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    /// Regular files, in enumeration order
    pub files: Vec<FileEntry>,
}

impl DirectorySnapshot {
    /// Number of files in the snapshot
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the directory held no regular files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over the entries in enumeration order
    pub fn iter(&self) -> std::slice::Iter<'_, FileEntry> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a DirectorySnapshot {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// List the regular files directly inside `dir`
///
/// Fails with [`SyncError::List`] if the directory cannot be opened or its
/// entries cannot be read. An entry whose metadata cannot be read, such as a
/// dangling symlink, is skipped.
pub fn list_dir(dir: &Path) -> Result<DirectorySnapshot> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false);

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_entry_error(&err) => {
                tracing::debug!("Skipping unreadable entry: {}", err);
                continue;
            }
            Err(err) => {
                let path = err.path().unwrap_or(dir).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory loop detected"));
                return Err(SyncError::list(path, source));
            }
        };

        let path = entry.path();
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => files.push(FileEntry {
                path: path.to_path_buf(),
                size: meta.len(),
            }),
            Ok(_) => {
                tracing::trace!("Skipping non-regular entry {}", path.display());
            }
            Err(e) => {
                tracing::debug!("Skipping unreadable entry {}: {}", path.display(), e);
            }
        }
    }

    tracing::debug!("Listed {} regular files in {}", files.len(), dir.display());

    Ok(DirectorySnapshot { files })
}

/// Whether a walk error concerns a single entry rather than the directory
///
/// Opening the directory fails at depth 0, and a failed `readdir` carries no
/// path. Anything else happened while inspecting one entry.
fn is_entry_error(err: &walkdir::Error) -> bool {
    err.depth() > 0 && err.path().is_some()
}
