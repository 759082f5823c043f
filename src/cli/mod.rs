//! Command-line interface for jobwatch.
//!
//! Provides commands for running a batch, re-monitoring an existing batch
//! and classifying a single log.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
