use anyhow::{Context, Result};
use clap::Parser;
use sonda::cli::{Cli, OutputFormat};
use sonda::export::{self, ExportFormat};
use sonda::{classify, json_output, table, CaptureConfig, CapturedRequest, RecordFilter};
use std::io::Read;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Read the session export named on the command line
fn load_records(args: &Cli) -> Result<Vec<CapturedRequest>> {
    let text = if args.input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read session from stdin")?;
        text
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("Failed to read {}", args.input.display()))?
    };

    json_output::parse_records(&text)
        .with_context(|| format!("Invalid session export {}", args.input.display()))
}

/// Configuration file merged with command-line overrides
fn capture_config(args: &Cli) -> Result<CaptureConfig> {
    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_file(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(window) = args.race_window_ms {
        config.race_window_ms = window;
    }
    if let Some(kb) = args.large_response_kb {
        config.large_response_kb = kb;
    }
    config.validate()?;
    Ok(config)
}

fn build_filter(args: &Cli) -> Result<RecordFilter> {
    let mut filter = RecordFilter::all();
    for expr in &args.filters {
        filter = filter.and(RecordFilter::from_expr(expr)?);
    }
    Ok(filter)
}

fn select(records: &[CapturedRequest], filter: &RecordFilter) -> Vec<CapturedRequest> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

fn render(
    records: &[CapturedRequest],
    filter: &RecordFilter,
    format: OutputFormat,
) -> Result<String> {
    let export_format = match format {
        // The table keeps each record's index in the loaded log
        OutputFormat::Table => {
            let rows = records
                .iter()
                .enumerate()
                .filter(|(_, record)| filter.matches(record));
            return Ok(table::render_indexed(rows));
        }
        OutputFormat::Summary => return Ok(table::render_summary(&select(records, filter))),
        OutputFormat::Json => ExportFormat::Json,
        OutputFormat::Ndjson => ExportFormat::Ndjson,
        OutputFormat::Csv => ExportFormat::Csv,
        OutputFormat::Har => ExportFormat::Har,
        OutputFormat::Curl => ExportFormat::Curl,
    };
    Ok(export::render(&select(records, filter), export_format)?)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    // Validate everything before touching the input
    let config = capture_config(&args)?;
    let filter = build_filter(&args)?;

    let mut records = load_records(&args)?;
    tracing::debug!(records = records.len(), "session loaded");

    // Re-classification sees the whole log, so the race window is intact
    if args.reclassify {
        classify::replay(&mut records, &config);
    }

    let output = render(&records, &filter, args.format)?;
    print!("{}", output);
    if !output.is_empty() && !output.ends_with('\n') {
        println!();
    }

    Ok(())
}
