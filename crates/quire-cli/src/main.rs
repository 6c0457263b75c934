//! # quire CLI
//!
//! Command-line interface for Quire tab sessions and version history.
//!
//! This binary provides human-friendly access to `quire-core` functionality.
//! Run `quire --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
