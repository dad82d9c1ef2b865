use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path (defaults to config/warden.yaml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level, overrides log.level from the configuration
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Metrics server port, overrides metrics.port (0 disables)
    #[arg(long)]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}
