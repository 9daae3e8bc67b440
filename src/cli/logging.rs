//! Logging utilities for CLI output

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level for CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Suppress all output except errors
    Quiet,
    /// Normal output level
    Normal,
    /// Verbose output with resolution diagnostics
    Verbose,
}

impl LogLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Default tracing directive when `RUST_LOG` is unset.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "debug",
        }
    }
}

/// Print a message if the current level permits it
pub fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

/// Install the tracing subscriber; diagnostics go to stderr.
///
/// `RUST_LOG` overrides the level implied by the CLI flags. Calling this
/// twice is harmless.
pub fn init_logging(level: LogLevel) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.filter_directive()));
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if let Err(e) = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init() {
        tracing::debug!(error = %e, "keeping the already installed tracing subscriber");
    }
}
