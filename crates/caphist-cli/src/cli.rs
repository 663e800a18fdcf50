//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "caphist",
    version,
    about = "Prepare encounter histories for capture-recapture modeling engines",
    long_about = "Turn long-format capture, telemetry, survey, or nest-check records into\n\
                  fixed-length encounter histories with covariates attached.\n\n\
                  Writes engine-ready CSV and MARK .inp tables plus a JSON manifest."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a job and write its outputs.
    Run(RunArgs),

    /// Load, build and join a job without emitting anything.
    Check(CheckArgs),

    /// List the supported model families.
    Families,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Path to the job's TOML configuration.
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output directory (default: the config's output.dir, or <CONFIG_DIR>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Render every output without writing files.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Merge subjects with identical history and covariates into one row.
    #[arg(long = "collapse")]
    pub collapse: bool,

    /// Table format to write (default: the config's output.format).
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormatArg>,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Path to the job's TOML configuration.
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormatArg {
    Csv,
    Inp,
    Both,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
