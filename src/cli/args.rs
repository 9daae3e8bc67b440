//! Command-line arguments
//!
//! ```bash
//! trainconf validate train.yaml --world-size 8
//! trainconf info train.json --format json
//! trainconf scale train.yaml --overflows 0001000
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// trainconf: training configuration resolver
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "trainconf")]
#[command(version)]
#[command(about = "Resolve and validate distributed training configuration")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Resolve a configuration file and report whether it is valid
    Validate(ValidateArgs),

    /// Print the fully resolved configuration
    Info(InfoArgs),

    /// Simulate dynamic loss scaling over a sequence of steps
    Scale(ScaleArgs),
}

/// Inputs shared by every command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ConfigArgs {
    /// Path to a JSON or YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Number of data-parallel workers
    #[arg(short, long, env = "WORLD_SIZE", default_value_t = 1)]
    pub world_size: u64,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: ConfigArgs,

    /// Show the resolved values after validation
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    #[command(flatten)]
    pub input: ConfigArgs,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the scale command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ScaleArgs {
    #[command(flatten)]
    pub input: ConfigArgs,

    /// Per-step overflow pattern: `1`/`x` overflow, `0`/`.` clean
    #[arg(short, long, value_name = "PATTERN")]
    pub overflows: String,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for info and scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!("Unknown output format: {s}. Valid formats: text, json, yaml")),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Decode an overflow pattern into one flag per step.
///
/// Whitespace, `,` and `_` are ignored so long patterns can be grouped.
pub fn parse_overflow_pattern(pattern: &str) -> Result<Vec<bool>, String> {
    let steps = pattern
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_')
        .map(|c| match c {
            '1' | 'x' | 'X' => Ok(true),
            '0' | '.' => Ok(false),
            other => Err(format!("Invalid overflow marker '{other}'. Use 1/x for overflow, 0/. for clean")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if steps.is_empty() {
        return Err("Overflow pattern must contain at least one step".to_string());
    }
    Ok(steps)
}
