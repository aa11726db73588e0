//! Core sync engine module
//!
//! Provides the run orchestration and the bounded worker pool that
//! executes one copy task per missing file.

mod engine;
mod scheduler;

pub use engine::*;
pub use scheduler::*;
