//! cURL command rendering for request-kind records

use crate::error::{Result, SondaError};
use crate::record::CapturedRequest;

/// Single-quote `value` for a POSIX shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// cURL command reproducing a captured request
///
/// Beacon, socket and message records have no cURL equivalent and are
/// rejected with [`SondaError::UnsupportedKind`].
pub fn to_curl(record: &CapturedRequest) -> Result<String> {
    if !record.transport_kind.is_http() {
        tracing::warn!(kind = %record.transport_kind, "not renderable as cURL");
        return Err(SondaError::UnsupportedKind(record.transport_kind));
    }

    let mut parts = vec![format!("curl {}", shell_quote(&record.url))];
    if record.method != "GET" {
        parts.push(format!("-X {}", shell_quote(&record.method)));
    }
    for (name, value) in &record.request_headers {
        parts.push(format!("-H {}", shell_quote(&format!("{}: {}", name, value))));
    }
    if !record.request_body_preview.is_empty() {
        parts.push(format!(
            "--data-raw {}",
            shell_quote(&record.request_body_preview)
        ));
    }

    Ok(parts.join(" \\\n  "))
}

/// cURL commands for every request-kind record, blank-line separated
pub fn to_curl_script(records: &[CapturedRequest]) -> String {
    records
        .iter()
        .filter(|record| record.transport_kind.is_http())
        .filter_map(|record| to_curl(record).ok())
        .collect::<Vec<_>>()
        .join("\n\n")
}
