//! CLI module for trainconf
//!
//! Argument parsing, logging setup and command handlers for the
//! `trainconf` binary.

mod args;
mod commands;
mod logging;

pub use args::{
    parse_args, parse_overflow_pattern, Cli, Command, ConfigArgs, InfoArgs, OutputFormat, ScaleArgs,
    ValidateArgs,
};
pub use commands::{run_command, simulate, ScaleRecord};
pub use logging::{init_logging, LogLevel};
