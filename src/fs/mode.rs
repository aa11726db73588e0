//! Creation-mode policy for destination files
//!
//! A new destination file gets the permission bits of its source. The bits
//! are passed to `open(2)` at creation and then set again on the open handle,
//! so the process umask cannot narrow them. The umask itself is never
//! changed, which keeps the policy local to the task creating the file.

use crate::error::{IoResultExt, Result, SyncError};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Permission bits carried over from a source file
#[cfg(unix)]
const PERMISSION_MASK: u32 = 0o777;

/// Mode to apply to a destination file when it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationMode {
    #[cfg(unix)]
    mode: u32,
    #[cfg(not(unix))]
    readonly: bool,
}

#[cfg(unix)]
impl CreationMode {
    /// Derive the policy from a source file's metadata
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        Self::from_mode(metadata.permissions().mode())
    }

    /// Build a policy from raw Unix mode bits; type and special bits are dropped
    pub fn from_mode(mode: u32) -> Self {
        Self {
            mode: mode & PERMISSION_MASK,
        }
    }

    /// Permission bits the destination will receive
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Set the creation mode on `options`
    pub fn apply_to_options(&self, options: &mut OpenOptions) {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(self.mode);
    }

    /// Set the permissions on an already-open destination handle
    pub fn apply_to_file(&self, file: &File) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(self.mode))
    }
}

#[cfg(not(unix))]
impl CreationMode {
    /// Derive the policy from a source file's metadata
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            readonly: metadata.permissions().readonly(),
        }
    }

    /// Creation options carry no mode on this platform
    pub fn apply_to_options(&self, _options: &mut OpenOptions) {}

    /// Mark the destination read-only if the source was
    pub fn apply_to_file(&self, file: &File) -> std::io::Result<()> {
        if self.readonly {
            let mut perms = file.metadata()?.permissions();
            perms.set_readonly(true);
            file.set_permissions(perms)?;
        }
        Ok(())
    }
}

/// Read the creation-mode policy for a copy of `source`
///
/// Fails with [`SyncError::Mode`] if the source's metadata cannot be read.
pub fn creation_mode(source: &Path) -> Result<CreationMode> {
    let metadata = std::fs::metadata(source).or_sync(source, SyncError::mode)?;
    Ok(CreationMode::from_metadata(&metadata))
}
