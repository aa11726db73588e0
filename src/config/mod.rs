//! Configuration module for dirsync
//!
//! Command line arguments and the validated run configuration.

mod settings;

pub use settings::*;
