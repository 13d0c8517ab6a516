//! Model execution: availability checks, substitution, and solver calls.

mod batch;
mod model;

pub use batch::{BatchEntry, BatchResult};
pub use model::{ModelRunner, RunOutcome, SkipReason};
