//! Progress reporting module
//!
//! Writes the per-task result lines and keeps display-only counters for
//! the end-of-run log line.

mod reporter;

pub use reporter::*;
