//! JSON and NDJSON output formats for captured records
//!
//! Both formats carry complete records, so they double as the import
//! format for offline analysis.

use crate::error::Result;
use crate::record::CapturedRequest;

/// Pretty-printed JSON array of every record
pub fn to_json(records: &[CapturedRequest]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// One compact JSON object per line
pub fn to_ndjson(records: &[CapturedRequest]) -> Result<String> {
    let mut output = String::new();
    for record in records {
        output.push_str(&serde_json::to_string(record)?);
        output.push('\n');
    }
    Ok(output)
}

/// Parse a JSON array or NDJSON, whichever `text` holds
pub fn parse_records(text: &str) -> Result<Vec<CapturedRequest>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str::<CapturedRequest>(line).map_err(Into::into))
        .collect()
}
