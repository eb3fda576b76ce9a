//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::StartOffset;
use std::path::PathBuf;

/// Log Processor - severity-routing log ingestion pipeline
#[derive(Parser, Debug)]
#[command(
    name = "log-processor",
    author,
    version,
    about = "Severity-routing log ingestion pipeline",
    long_about = "Consumes structured log events from a source topic, classifies them by severity,\n\
                  and forwards every record to the database topic and ERROR/FATAL records to the \n\
                  alert topic as well, reporting the outcome of each delivery."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOG_PROCESSOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LOG_PROCESSOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the log processor
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "LOG_PROCESSOR_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the consumer group from configuration
    #[arg(long, env = "LOG_PROCESSOR_GROUP_ID")]
    pub group_id: Option<String>,

    /// Override the starting offset policy (earliest | latest)
    #[arg(long, env = "LOG_PROCESSOR_START_OFFSET", value_parser = parse_start_offset)]
    pub start_offset: Option<StartOffset>,

    /// Override the maximum number of concurrent delivery attempts (0 = unbounded)
    #[arg(long, env = "LOG_PROCESSOR_MAX_IN_FLIGHT")]
    pub max_in_flight: Option<usize>,

    /// Stop after reading this many records (0 = unlimited)
    #[arg(long, default_value = "0", env = "LOG_PROCESSOR_MAX_RECORDS")]
    pub max_records: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "LOG_PROCESSOR_TIMEOUT")]
    pub timeout: u64,

    /// Do not commit consumed offsets
    #[arg(long)]
    pub no_commit: bool,

    /// Validate configuration and exit without running the processor
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_start_offset(s: &str) -> Result<StartOffset, String> {
    s.parse()
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the effective configuration, defaults included, as TOML
    #[arg(long, conflicts_with = "json")]
    pub effective: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
