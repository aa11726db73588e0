//! dirsync CLI - copy files missing from one directory into another

use clap::error::ErrorKind;
use clap::Parser;
use dirsync::config::{log_level, CliArgs, SyncConfig};
use dirsync::core::SyncEngine;
use dirsync::progress::Reporter;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(args.verbose))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let reporter = Arc::new(Reporter::new(program_name()).quiet(args.quiet));

    let config = match SyncConfig::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            reporter.error(&e);
            std::process::exit(1);
        }
    };

    let engine = SyncEngine::new(config).with_reporter(Arc::clone(&reporter));
    match engine.run() {
        Ok(summary) => {
            tracing::info!(
                "Done: {} dispatched, {} skipped in {:.2?}",
                summary.dispatched,
                summary.skipped,
                summary.duration
            );
        }
        Err(e) => {
            reporter.error(&e);
            std::process::exit(1);
        }
    }
}

/// Basename of argv[0], used to label error lines
fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
