//! trainconf CLI
//!
//! # Usage
//!
//! ```bash
//! # Resolve and validate a config for 8 workers
//! trainconf validate train.yaml --world-size 8
//!
//! # Print the resolved config
//! trainconf info train.yaml --format json
//!
//! # Replay an overflow pattern through the loss scaler
//! trainconf scale train.yaml --overflows 0000100
//! ```

use clap::Parser;
use std::process::ExitCode;
use trainconf::cli::{init_logging, run_command, Cli, LogLevel};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LogLevel::from_flags(cli.verbose, cli.quiet));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
