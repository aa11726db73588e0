//! Byte-exact file copy
//!
//! [`FileCopier::copy_into`] copies one file into a directory. The
//! destination is created exclusively, so a file that appeared after the
//! directories were diffed is never overwritten. Data moves through a fixed
//! chunk buffer with explicit handling of short writes and `EINTR`.

use crate::error::{IoResultExt, Result, SyncError};
use crate::fs::CreationMode;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Size of the copy buffer
pub const COPY_BUF_SIZE: usize = 64 * 1024;

/// Copy operation statistics
#[derive(Debug, Clone)]
pub struct CopyStats {
    /// Bytes written to the destination
    pub bytes_copied: u64,
    /// Path of the created destination file
    pub dest_path: PathBuf,
    /// Duration of the copy
    pub duration: Duration,
}

/// Outcome of a single copy, including handle close failures
///
/// Close failures never change `result`; they are carried alongside it so
/// the caller can report them.
#[derive(Debug)]
pub struct CopyOutcome {
    /// Bytes copied, or the error that stopped the copy
    pub result: Result<CopyStats>,
    /// Errors raised while closing the source or destination
    pub close_errors: Vec<SyncError>,
}

impl CopyOutcome {
    fn failed(err: SyncError) -> Self {
        Self {
            result: Err(err),
            close_errors: Vec::new(),
        }
    }

    /// Discard close errors and keep the copy result
    pub fn into_result(self) -> Result<CopyStats> {
        self.result
    }
}

/// Failure inside the streaming loop
#[derive(Debug)]
enum StreamError {
    Read { source: std::io::Error, written: u64 },
    Write { source: std::io::Error, written: u64 },
}

/// Chunked file copier
#[derive(Debug, Clone)]
pub struct FileCopier {
    chunk_size: usize,
}

impl Default for FileCopier {
    fn default() -> Self {
        Self::new()
    }
}

impl FileCopier {
    /// Create a copier using [`COPY_BUF_SIZE`] chunks
    pub fn new() -> Self {
        Self {
            chunk_size: COPY_BUF_SIZE,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_chunk_size(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Destination path for `source` inside `dest_dir`
    ///
    /// The directory is canonicalized and the source's basename appended. A
    /// directory that can no longer be resolved fails only this file, as
    /// [`SyncError::DestCreate`].
    pub fn dest_path_for(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let dir = dest_dir.canonicalize().or_sync(dest_dir, SyncError::dest_create)?;
        let name = source.file_name().ok_or_else(|| {
            SyncError::source_open(
                source.to_path_buf(),
                std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
        Ok(dir.join(name))
    }

    /// Copy `source` into `dest_dir` under the same basename
    ///
    /// The destination is created with exclusive-create semantics and `mode`
    /// applied. On a read or write failure the partially written destination
    /// is left in place.
    pub fn copy_into(&self, source: &Path, dest_dir: &Path, mode: CreationMode) -> CopyOutcome {
        let start = Instant::now();

        let src_file = match File::open(source) {
            Ok(file) => file,
            Err(e) => return CopyOutcome::failed(SyncError::source_open(source.to_path_buf(), e)),
        };

        let mut close_errors = Vec::new();

        let dest_path = match Self::dest_path_for(source, dest_dir) {
            Ok(path) => path,
            Err(e) => {
                close_errors.extend(close_file(src_file, source).err());
                return CopyOutcome {
                    result: Err(e),
                    close_errors,
                };
            }
        };

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        mode.apply_to_options(&mut options);

        let dst_file = match options.open(&dest_path) {
            Ok(file) => file,
            Err(e) => {
                close_errors.extend(close_file(src_file, source).err());
                return CopyOutcome {
                    result: Err(SyncError::dest_create(dest_path, e)),
                    close_errors,
                };
            }
        };

        if let Err(e) = mode.apply_to_file(&dst_file) {
            tracing::warn!("Could not set permissions on {}: {}", dest_path.display(), e);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut reader = src_file;
        let mut writer = dst_file;
        let streamed = stream_copy(&mut reader, &mut writer, &mut buf);

        close_errors.extend(close_file(reader, source).err());
        close_errors.extend(close_file(writer, &dest_path).err());

        let result = match streamed {
            Ok(bytes_copied) => Ok(CopyStats {
                bytes_copied,
                dest_path,
                duration: start.elapsed(),
            }),
            Err(StreamError::Read { source: err, written }) => Err(SyncError::Read {
                path: source.to_path_buf(),
                written,
                source: err,
            }),
            Err(StreamError::Write { source: err, written }) => Err(SyncError::Write {
                path: dest_path,
                written,
                source: err,
            }),
        };

        CopyOutcome {
            result,
            close_errors,
        }
    }
}

/// Move all bytes from `reader` to `writer` through `buf`
///
/// Interrupted reads and writes are retried. A short write resumes from the
/// first unwritten byte. Any other error stops the loop.
fn stream_copy<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
) -> std::result::Result<u64, StreamError> {
    let mut written: u64 = 0;

    loop {
        let read = match reader.read(buf) {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(StreamError::Read { source, written }),
        };

        let mut pending = &buf[..read];
        while !pending.is_empty() {
            match writer.write(pending) {
                Ok(0) => {
                    return Err(StreamError::Write {
                        source: std::io::Error::new(ErrorKind::WriteZero, "failed to write whole chunk"),
                        written,
                    });
                }
                Ok(n) => {
                    pending = &pending[n..];
                    written += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(source) => return Err(StreamError::Write { source, written }),
            }
        }
    }
}

/// Close `file`, surfacing the error `close(2)` returns
#[cfg(unix)]
fn close_file(file: File, path: &Path) -> Result<()> {
    use std::os::fd::IntoRawFd;
    nix::unistd::close(file.into_raw_fd())
        .map_err(|errno| SyncError::close(path.to_path_buf(), std::io::Error::from(errno)))
}

#[cfg(not(unix))]
fn close_file(file: File, _path: &Path) -> Result<()> {
    drop(file);
    Ok(())
}
