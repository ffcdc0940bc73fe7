//! Command-line interface for lotwatch.

mod commands;
pub mod progress;

pub use commands::{is_verbose, run};
