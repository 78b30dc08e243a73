//! Command-line interface
//!
//! One binary with a subcommand per pipeline stage.

mod main;

pub use main::{main, Cli, PipelineCommand};
