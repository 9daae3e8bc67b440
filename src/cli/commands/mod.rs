//! CLI command implementations

mod info;
mod scale;
mod validate;


pub use scale::{simulate, ScaleRecord};

use crate::cli::{Cli, Command, LogLevel};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.verbose, cli.quiet);

    match cli.command {
        Command::Validate(args) => validate::run_validate(args, log_level),
        Command::Info(args) => info::run_info(args, log_level),
        Command::Scale(args) => scale::run_scale(args, log_level),
    }
}
