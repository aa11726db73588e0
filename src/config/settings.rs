//! Configuration settings for dirsync
//!
//! Parses the command line and validates it into a [`SyncConfig`].

use crate::error::{IoResultExt, Result, SyncError};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Smallest accepted concurrency limit
pub const MIN_CONCURRENCY: usize = 2;

/// dirsync - copy files missing from one directory into another
#[derive(Parser, Debug, Clone)]
#[command(name = "dirsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "One-way, non-recursive directory sync with bounded parallel copies")]
#[command(long_about = r#"
Copies every regular file that exists in SOURCE but has no file of the same
name in DESTINATION. Subdirectories are ignored and existing destination files
are never modified.

Examples:
  dirsync ./photos /mnt/backup/photos 4
  dirsync -q src dst 8
"#)]
pub struct CliArgs {
    /// Directory to copy files from
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Directory to copy missing files into
    #[arg(value_name = "DESTINATION")]
    pub destination: String,

    /// Maximum number of copies running at once (at least 2)
    #[arg(value_name = "MAX_CONCURRENCY", allow_hyphen_values = true)]
    pub max_concurrency: String,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not print a line per copied file
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Validated configuration for one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Source directory
    pub source: PathBuf,
    /// Destination directory
    pub destination: PathBuf,
    /// Maximum number of concurrent copy tasks
    pub max_concurrency: usize,
}

impl SyncConfig {
    /// Create a configuration without validating it
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, max_concurrency: usize) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            max_concurrency,
        }
    }

    /// Build and validate a configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let source = PathBuf::from(&args.source);
        let destination = PathBuf::from(&args.destination);

        ensure_dir(&source)?;
        ensure_dir(&destination)?;
        ensure_distinct(&source, &destination)?;

        let config = Self {
            source,
            destination,
            max_concurrency: parse_concurrency(&args.max_concurrency)?,
        };

        Ok(config)
    }

    /// Check the paths and the concurrency limit
    ///
    /// Nothing is listed or copied before this succeeds.
    pub fn validate(&self) -> Result<()> {
        ensure_dir(&self.source)?;
        ensure_dir(&self.destination)?;
        ensure_distinct(&self.source, &self.destination)?;
        ensure_concurrency(self.max_concurrency)
    }
}

/// Log level implied by `-v` flags when `RUST_LOG` is not set
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).or_sync(path, SyncError::path_error)?;
    if meta.is_dir() {
        Ok(())
    } else {
        Err(SyncError::NotADirectory(path.to_path_buf()))
    }
}

fn ensure_distinct(source: &Path, destination: &Path) -> Result<()> {
    let src_real = source.canonicalize().or_sync(source, SyncError::path_error)?;
    let dst_real = destination.canonicalize().or_sync(destination, SyncError::path_error)?;

    if src_real == dst_real {
        return Err(SyncError::SameDirectory(src_real));
    }
    Ok(())
}

fn ensure_concurrency(limit: usize) -> Result<()> {
    if limit < MIN_CONCURRENCY {
        return Err(SyncError::argument(format!(
            "Maximum of running processes must be greater or equal to {}",
            MIN_CONCURRENCY
        )));
    }
    Ok(())
}

/// Parse the concurrency argument
pub fn parse_concurrency(value: &str) -> Result<usize> {
    use std::num::IntErrorKind;

    let parsed: i64 = value.trim().parse().map_err(|e: std::num::ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            SyncError::argument("Numerical result out of range")
        }
        _ => SyncError::argument("Maximum of running processes is not an integer"),
    })?;

    let limit = usize::try_from(parsed).unwrap_or(0);
    ensure_concurrency(limit)?;
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(source: &Path, destination: &Path, limit: &str) -> CliArgs {
        CliArgs {
            source: source.to_string_lossy().into_owned(),
            destination: destination.to_string_lossy().into_owned(),
            max_concurrency: limit.to_string(),
            verbose: 0,
            quiet: false,
        }
    }

    #[test]
    fn test_parse_concurrency() {
        assert_eq!(parse_concurrency("4").unwrap(), 4);
        assert_eq!(parse_concurrency("2").unwrap(), 2);

        let err = parse_concurrency("four").unwrap_err();
        assert!(err.to_string().contains("not an integer"));

        let err = parse_concurrency("1").unwrap_err();
        assert!(err.to_string().contains("greater or equal to 2"));

        assert!(parse_concurrency("-3").is_err());
        assert!(parse_concurrency("0").is_err());

        let err = parse_concurrency("99999999999999999999").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_from_cli_valid() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();

        let config = SyncConfig::from_cli(&args(src.path(), dst.path(), "3")).unwrap();
        assert_eq!(config.max_concurrency, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_same_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let alias = dir.path().join(".");

        let err = SyncConfig::from_cli(&args(dir.path(), &alias, "2")).unwrap_err();
        assert!(matches!(err, SyncError::SameDirectory(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        let err = SyncConfig::from_cli(&args(&file, dir.path(), "2")).unwrap_err();
        assert!(matches!(err, SyncError::NotADirectory(_)));

        let missing = dir.path().join("missing");
        let err = SyncConfig::from_cli(&args(dir.path(), &missing, "2")).unwrap_err();
        assert!(matches!(err, SyncError::PathError { .. }));
    }

    #[test]
    fn test_validate_rejects_small_limit() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();

        let config = SyncConfig::new(src.path(), dst.path(), 1);
        assert!(matches!(config.validate(), Err(SyncError::Argument(_))));
    }

    #[test]
    fn test_cli_parsing() {
        let args = CliArgs::try_parse_from(["dirsync", "-vv", "a", "b", "4"]).unwrap();
        assert_eq!(args.source, "a");
        assert_eq!(args.destination, "b");
        assert_eq!(args.max_concurrency, "4");
        assert_eq!(log_level(args.verbose), "debug");

        assert!(CliArgs::try_parse_from(["dirsync", "a", "b"]).is_err());
    }
}
