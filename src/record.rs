//! Captured request records
//!
//! [`CapturedRequest`] is the one uniform record every interceptor produces,
//! whatever transport the traffic went through. Exporters, the table and the
//! CLI all read this type; only the session store writes it after handoff.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which transport entry point produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// One-shot request/response call
    Request,
    /// Request object whose response body arrives as a stream
    Stream,
    /// Fire-and-forget payload, no response visible
    Beacon,
    /// Persistent bidirectional connection
    Socket,
    /// A single message on a persistent connection (verbose mode only)
    SocketMessage,
}

impl TransportKind {
    pub const ALL: [TransportKind; 5] = [
        TransportKind::Request,
        TransportKind::Stream,
        TransportKind::Beacon,
        TransportKind::Socket,
        TransportKind::SocketMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Request => "request",
            TransportKind::Stream => "stream",
            TransportKind::Beacon => "beacon",
            TransportKind::Socket => "socket",
            TransportKind::SocketMessage => "message",
        }
    }

    /// Request kinds are the ones with an HTTP request/response shape
    pub fn is_http(&self) -> bool {
        matches!(self, TransportKind::Request | TransportKind::Stream)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TransportKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown transport kind '{}'", s.trim()))
    }
}

/// Category label assigned by the classifier
///
/// Declaration order is the order findings are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    Framework,
    ThirdParty,
    State,
    Auth,
    Input,
    Error,
    Transform,
    Events,
    Async,
    Memory,
}

impl Tag {
    pub const ALL: [Tag; 10] = [
        Tag::Framework,
        Tag::ThirdParty,
        Tag::State,
        Tag::Auth,
        Tag::Input,
        Tag::Error,
        Tag::Transform,
        Tag::Events,
        Tag::Async,
        Tag::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Framework => "Framework",
            Tag::ThirdParty => "ThirdParty",
            Tag::State => "State",
            Tag::Auth => "Auth",
            Tag::Input => "Input",
            Tag::Error => "Error",
            Tag::Transform => "Transform",
            Tag::Events => "Events",
            Tag::Async => "Async",
            Tag::Memory => "Memory",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown tag '{}'", wanted))
    }
}

/// Insertion-ordered set of tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a tag, returning false if it was already present
    pub fn insert(&mut self, tag: Tag) -> bool {
        if self.0.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn to_vec(&self) -> Vec<Tag> {
        self.0.clone()
    }

    /// Space-separated tag names, as used by the CSV and table outputs
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(Tag::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

/// One observed network operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    /// Session-unique id, assigned on append
    #[serde(default)]
    pub id: u64,
    pub transport_kind: TransportKind,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub request_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub request_body_preview: String,
    pub timestamp_iso: String,
    /// Milliseconds since the session epoch
    pub monotonic_start: f64,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub response_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub initiator: String,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub findings: Vec<String>,
}

impl CapturedRequest {
    /// Create a partial record with only call-time fields populated
    pub fn new(kind: TransportKind, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: 0,
            transport_kind: kind,
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            request_headers: BTreeMap::new(),
            request_body_preview: String::new(),
            timestamp_iso: chrono::Utc::now()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            monotonic_start: 0.0,
            status: 0,
            status_text: String::new(),
            duration_ms: 0.0,
            response_size_bytes: 0,
            response_preview: None,
            error_text: None,
            stack_trace: None,
            initiator: String::new(),
            tags: TagSet::new(),
            findings: Vec::new(),
        }
    }

    /// Message entries are kept out of the main request table
    pub fn is_message(&self) -> bool {
        self.transport_kind == TransportKind::SocketMessage
    }

    /// Completion instant in milliseconds since the session epoch
    pub fn completed_at(&self) -> f64 {
        self.monotonic_start + self.duration_ms.max(0.0)
    }

    /// Response size in kilobytes
    pub fn response_kb(&self) -> f64 {
        self.response_size_bytes as f64 / 1024.0
    }

    /// Drop every classification result
    pub fn reset_classification(&mut self) {
        self.tags.clear();
        self.findings.clear();
    }
}

/// Minimal projection kept only for race correlation
#[derive(Debug, Clone, PartialEq)]
pub struct SessionWindowEntry {
    pub monotonic_time: f64,
    pub url: String,
    pub method: String,
    pub status: u16,
}

impl SessionWindowEntry {
    pub fn from_record(record: &CapturedRequest, monotonic_time: f64) -> Self {
        Self {
            monotonic_time,
            url: record.url.clone(),
            method: record.method.clone(),
            status: record.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_uppercases_method() {
        let record = CapturedRequest::new(TransportKind::Request, "post", "https://a.test/");
        assert_eq!(record.method, "POST");
        assert!(record.tags.is_empty());
        assert!(record.timestamp_iso.ends_with('Z'));
    }

    #[test]
    fn test_tag_set_keeps_insertion_order_without_duplicates() {
        let mut tags = TagSet::new();
        assert!(tags.insert(Tag::Memory));
        assert!(tags.insert(Tag::Auth));
        assert!(!tags.insert(Tag::Memory));
        assert_eq!(tags.to_vec(), vec![Tag::Memory, Tag::Auth]);
        assert_eq!(tags.joined(), "Memory Auth");
    }

    #[test]
    fn test_tag_parse_is_case_insensitive() {
        assert_eq!("auth".parse::<Tag>().unwrap(), Tag::Auth);
        assert_eq!(" THIRDPARTY ".parse::<Tag>().unwrap(), Tag::ThirdParty);
        assert!("nope".parse::<Tag>().is_err());
    }

    #[test]
    fn test_kind_round_trips_through_label() {
        for kind in TransportKind::ALL {
            assert_eq!(kind.as_str().parse::<TransportKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&TransportKind::SocketMessage).unwrap();
        assert_eq!(json, "\"socket-message\"");
    }

    #[test]
    fn test_record_json_uses_camel_case() {
        let mut record = CapturedRequest::new(TransportKind::Request, "GET", "https://a.test/");
        record.tags.insert(Tag::Auth);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("transportKind").is_some());
        assert!(json.get("requestBodyPreview").is_some());
        assert_eq!(json["tags"][0], "Auth");
        assert!(json.get("errorText").is_none());
    }

    #[test]
    fn test_completed_at_clamps_negative_duration() {
        let mut record = CapturedRequest::new(TransportKind::Request, "GET", "https://a.test/");
        record.monotonic_start = 100.0;
        record.duration_ms = -5.0;
        assert_eq!(record.completed_at(), 100.0);
    }

    #[test]
    fn test_response_kb() {
        let mut record = CapturedRequest::new(TransportKind::Request, "GET", "https://a.test/");
        record.response_size_bytes = 2048;
        assert_eq!(record.response_kb(), 2.0);
    }
}
