//! CSV output format for captured records
//!
//! One row per non-message record, for spreadsheet analysis and machine
//! parsing. Fields holding a comma, quote or line break are quoted.

use crate::record::CapturedRequest;

/// Column names, in output order
pub const CSV_HEADER: [&str; 10] = [
    "time",
    "kind",
    "method",
    "status",
    "duration_ms",
    "size_bytes",
    "url",
    "request_body",
    "initiator",
    "tags",
];

/// CSV output formatter
#[derive(Debug, Default)]
pub struct CsvOutput {
    rows: Vec<[String; 10]>,
}

impl CsvOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; message entries are skipped
    pub fn add_record(&mut self, record: &CapturedRequest) {
        if record.is_message() {
            return;
        }
        self.rows.push(Self::fields(record));
    }

    /// Unescaped field values of a record, in column order
    pub fn fields(record: &CapturedRequest) -> [String; 10] {
        [
            record.timestamp_iso.clone(),
            record.transport_kind.to_string(),
            record.method.clone(),
            record.status.to_string(),
            record.duration_ms.to_string(),
            record.response_size_bytes.to_string(),
            record.url.clone(),
            record.request_body_preview.clone(),
            record.initiator.clone(),
            record.tags.joined(),
        ]
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = CSV_HEADER.join(",");
        output.push('\n');

        for row in &self.rows {
            let escaped: Vec<String> = row.iter().map(|f| Self::escape_field(f)).collect();
            output.push_str(&escaped.join(","));
            output.push('\n');
        }

        output
    }
}

/// CSV for a whole log
pub fn to_csv(records: &[CapturedRequest]) -> String {
    let mut output = CsvOutput::new();
    for record in records {
        output.add_record(record);
    }
    output.to_csv()
}
