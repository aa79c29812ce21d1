//! Export format selection

use crate::error::{Result, SondaError};
use crate::record::CapturedRequest;
use crate::{csv_output, curl_output, har_output, json_output};
use std::fmt;
use std::str::FromStr;

/// Serialized forms a session log can be exported as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Ndjson,
    Csv,
    Har,
    Curl,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Ndjson => "ndjson",
            ExportFormat::Csv => "csv",
            ExportFormat::Har => "har",
            ExportFormat::Curl => "curl",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = SondaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "ndjson" => Ok(ExportFormat::Ndjson),
            "csv" => Ok(ExportFormat::Csv),
            "har" => Ok(ExportFormat::Har),
            "curl" => Ok(ExportFormat::Curl),
            other => Err(SondaError::Config(format!("unknown export format: {}", other))),
        }
    }
}

/// Render `records` in `format`
pub fn render(records: &[CapturedRequest], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => json_output::to_json(records),
        ExportFormat::Ndjson => json_output::to_ndjson(records),
        ExportFormat::Csv => Ok(csv_output::to_csv(records)),
        ExportFormat::Har => har_output::to_har_string(records),
        ExportFormat::Curl => Ok(curl_output::to_curl_script(records)),
    }
}
