//! Basename membership index
//!
//! The diff between source and destination is decided by filename alone.
//! [`NameSet`] holds the basenames of a destination snapshot and answers
//! exact, case-sensitive membership queries.

use crate::fs::{DirectorySnapshot, FileEntry};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};

/// Set of basenames present in a directory when it was listed
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    names: HashSet<OsString>,
}

impl NameSet {
    /// Build the index from a snapshot
    pub fn from_snapshot(snapshot: &DirectorySnapshot) -> Self {
        snapshot.iter().map(FileEntry::file_name).collect()
    }

    /// Check whether `name` was present
    pub fn contains(&self, name: &OsStr) -> bool {
        self.names.contains(name)
    }

    /// Check whether an entry with the same basename was present
    pub fn contains_entry(&self, entry: &FileEntry) -> bool {
        self.contains(entry.file_name())
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> FromIterator<&'a OsStr> for NameSet {
    fn from_iter<I: IntoIterator<Item = &'a OsStr>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(OsStr::to_os_string).collect(),
        }
    }
}
