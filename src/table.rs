//! Console table and summary rendering
//!
//! Column layout follows the strace `-c` style: fixed-width numeric columns,
//! dashed rules, free text last.

use crate::record::{CapturedRequest, Tag, TransportKind};
use std::fmt::Write as _;

/// URLs longer than this are cut in the table
pub const URL_WIDTH: usize = 80;

const RULE: &str = "----- ------- ------ ------ ---------- ---------- -------------------- ------------------------- ----";

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Main request table; message entries are left out
///
/// The index column is the record's position in the full log, the value
/// the index-based queries expect.
pub fn render_table(records: &[CapturedRequest]) -> String {
    render_indexed(records.iter().enumerate())
}

/// Table over a subset of a log, each record paired with its log index
pub fn render_indexed<'a>(
    rows: impl IntoIterator<Item = (usize, &'a CapturedRequest)>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5} {:<7} {:<6} {:>6} {:>10} {:>10} {:<20} {:<25} url",
        "#", "kind", "method", "status", "ms", "bytes", "initiator", "tags"
    );
    let _ = writeln!(out, "{}", RULE);

    let mut shown = 0;
    for (index, record) in rows {
        if record.is_message() {
            continue;
        }
        shown += 1;
        let _ = writeln!(
            out,
            "{:>5} {:<7} {:<6} {:>6} {:>10.1} {:>10} {:<20} {:<25} {}",
            index,
            record.transport_kind.as_str(),
            clip(&record.method, 6),
            record.status,
            record.duration_ms,
            record.response_size_bytes,
            clip(&record.initiator, 20),
            clip(&record.tags.joined(), 25),
            clip(&record.url, URL_WIDTH)
        );
    }

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{} requests", shown);
    out
}

/// Per-tag and per-kind counts
pub fn render_summary(records: &[CapturedRequest]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{:>9} tag", "records");
    let _ = writeln!(out, "--------- ----------");
    for tag in Tag::ALL {
        let count = records.iter().filter(|r| r.tags.contains(tag)).count();
        if count > 0 {
            let _ = writeln!(out, "{:>9} {}", count, tag);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:>9} kind", "records");
    let _ = writeln!(out, "--------- ----------");
    for kind in TransportKind::ALL {
        let count = records
            .iter()
            .filter(|r| r.transport_kind == kind)
            .count();
        if count > 0 {
            let _ = writeln!(out, "{:>9} {}", count, kind);
        }
    }

    let _ = writeln!(out, "--------- ----------");
    let _ = writeln!(out, "{:>9} total", records.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: TransportKind, url: &str, tags: &[Tag]) -> CapturedRequest {
        let mut record = CapturedRequest::new(kind, "GET", url);
        record.status = 200;
        for tag in tags {
            record.tags.insert(*tag);
        }
        record
    }

    #[test]
    fn test_table_skips_messages_but_keeps_log_indexes() {
        let records = vec![
            record(TransportKind::SocketMessage, "wss://a.test/", &[Tag::Events]),
            record(TransportKind::Request, "https://a.test/login", &[Tag::Auth]),
        ];
        let table = render_table(&records);
        assert!(!table.contains("wss://a.test/"));
        let row = table.lines().nth(2).unwrap();
        assert!(row.trim_start().starts_with("1 request"));
        assert!(row.contains("Auth"));
        assert!(table.ends_with("1 requests\n"));
    }

    #[test]
    fn test_table_clips_long_urls() {
        let url = format!("https://a.test/{}", "x".repeat(200));
        let table = render_table(&[record(TransportKind::Request, &url, &[])]);
        let row = table.lines().nth(2).unwrap();
        let shown = row.split_whitespace().last().unwrap();
        assert_eq!(shown.chars().count(), URL_WIDTH);
        assert!(shown.ends_with('…'));
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            record(TransportKind::Request, "https://a.test/1", &[Tag::Auth, Tag::Error]),
            record(TransportKind::Request, "https://a.test/2", &[Tag::Auth]),
            record(TransportKind::Beacon, "https://a.test/3", &[]),
        ];
        let summary = render_summary(&records);
        assert!(summary.contains("        2 Auth\n"));
        assert!(summary.contains("        1 Error\n"));
        assert!(summary.contains("        2 request\n"));
        assert!(summary.contains("        1 beacon\n"));
        assert!(summary.contains("        3 total\n"));
        assert!(!summary.contains("Memory"));
    }
}
