//! File system operations module
//!
//! Flat directory listing, basename indexing, creation-mode policy and
//! the chunked copy loop used by each worker.

mod mode;
mod names;
mod operations;
mod scanner;

pub use mode::*;
pub use names::*;
pub use operations::*;
pub use scanner::*;
