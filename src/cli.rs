//! CLI argument parsing for Sonda

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for a loaded session log
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Console request table (default)
    Table,
    /// Per-tag and per-kind counts
    Summary,
    /// Pretty JSON array
    Json,
    /// One JSON record per line
    Ndjson,
    /// CSV for spreadsheet analysis
    Csv,
    /// HAR 1.2 archive
    Har,
    /// cURL commands for request-kind records
    Curl,
}

#[derive(Parser, Debug)]
#[command(name = "sonda")]
#[command(version)]
#[command(about = "Inspect, re-classify and export captured network sessions", long_about = None)]
pub struct Cli {
    /// Session export to load (JSON array or NDJSON); "-" reads stdin
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Filter records (e.g., -e tag=Auth,Input or -e "kind=request;method=POST")
    #[arg(short = 'e', long = "expr", value_name = "EXPR")]
    pub filters: Vec<String>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Re-run classification over the loaded records
    #[arg(long = "reclassify")]
    pub reclassify: bool,

    /// Capture configuration file (TOML) used when re-classifying
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Race detection window in milliseconds (overrides the config file)
    #[arg(long = "race-window-ms", value_name = "MS")]
    pub race_window_ms: Option<f64>,

    /// Large response threshold in kilobytes (overrides the config file)
    #[arg(long = "large-response-kb", value_name = "KB")]
    pub large_response_kb: Option<u64>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
