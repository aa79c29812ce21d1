//! Request body payloads and their capped text previews
//!
//! Rendering never fails: binary payloads become a typed placeholder with
//! their size, and payloads that cannot be rendered become
//! [`UNSERIALIZABLE`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Placeholder for payloads that could not be rendered
pub const UNSERIALIZABLE: &str = "[unserializable]";

/// A payload that renders its own preview text
///
/// Used for structured bodies the interceptor has no built-in rendering for.
pub trait BodyPreview: Send + Sync {
    /// Text rendering of the payload
    fn preview(&self) -> anyhow::Result<String>;

    /// Raw bytes handed to the transport
    fn to_bytes(&self) -> Vec<u8>;
}

/// Outgoing payload as supplied by the caller
#[derive(Clone)]
pub enum RequestBody {
    Text(String),
    /// Form-like key/value structure
    Form(Vec<(String, String)>),
    Binary(Vec<u8>),
    /// Typed binary object
    Blob { content_type: String, data: Vec<u8> },
    Custom(Arc<dyn BodyPreview>),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RequestBody::Form(pairs) => f.debug_tuple("Form").field(pairs).finish(),
            RequestBody::Binary(data) => write!(f, "Binary({} bytes)", data.len()),
            RequestBody::Blob { content_type, data } => {
                write!(f, "Blob({}, {} bytes)", content_type, data.len())
            }
            RequestBody::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl RequestBody {
    /// Flatten to the uncapped preview text
    pub fn render(&self) -> String {
        match self {
            RequestBody::Text(text) => text.clone(),
            RequestBody::Form(pairs) => pairs
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join("&"),
            RequestBody::Binary(data) => format!("[binary {} bytes]", data.len()),
            RequestBody::Blob { content_type, data } => {
                let content_type = if content_type.is_empty() {
                    "application/octet-stream"
                } else {
                    content_type.as_str()
                };
                format!("[blob {} {} bytes]", content_type, data.len())
            }
            RequestBody::Custom(source) => {
                match catch_unwind(AssertUnwindSafe(|| source.preview())) {
                    Ok(Ok(text)) => text,
                    Ok(Err(e)) => {
                        tracing::warn!("body preview failed: {}", e);
                        UNSERIALIZABLE.to_string()
                    }
                    Err(_) => {
                        tracing::warn!("body preview panicked");
                        UNSERIALIZABLE.to_string()
                    }
                }
            }
        }
    }

    /// Capped preview, see [`truncate_preview`]
    pub fn preview(&self, limit: usize) -> String {
        truncate_preview(&self.render(), limit)
    }

    /// Payload bytes as a transport would send them
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Text(text) => text.clone().into_bytes(),
            RequestBody::Form(pairs) => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in pairs {
                    serializer.append_pair(key, value);
                }
                serializer.finish().into_bytes()
            }
            RequestBody::Binary(data) => data.clone(),
            RequestBody::Blob { data, .. } => data.clone(),
            RequestBody::Custom(source) => source.to_bytes(),
        }
    }

    /// Content type implied by the payload shape, if any
    pub fn implied_content_type(&self) -> Option<&str> {
        match self {
            RequestBody::Text(_) => Some("text/plain;charset=UTF-8"),
            RequestBody::Form(_) => Some("application/x-www-form-urlencoded"),
            RequestBody::Blob { content_type, .. } if !content_type.is_empty() => {
                Some(content_type.as_str())
            }
            _ => None,
        }
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(data: Vec<u8>) -> Self {
        RequestBody::Binary(data)
    }
}

/// Cap `text` at `limit` characters
///
/// Text within the limit is returned unchanged. Longer text keeps a prefix
/// followed by `…(+N)`, where N counts the elided characters, and the whole
/// result is exactly `limit` characters. When the limit is too small to hold
/// the marker the text is cut at `limit` characters with no marker.
pub fn truncate_preview(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }

    truncate_with_total(text, total, limit)
}

/// Preview of a response body: lossy UTF-8 of the first bytes, capped
pub fn response_preview(body: &[u8], limit: usize) -> String {
    // Four bytes per char is the UTF-8 maximum, so this slice always
    // holds more than `limit` chars when the body is long enough.
    let mut window = body.len().min(limit.saturating_mul(4).saturating_add(4));
    while window < body.len() && window > 0 && (body[window] & 0xC0) == 0x80 {
        window -= 1;
    }
    let text = String::from_utf8_lossy(&body[..window]);
    let total = if window < body.len() {
        text.chars().count() + String::from_utf8_lossy(&body[window..]).chars().count()
    } else {
        text.chars().count()
    };
    if total <= limit {
        return text.into_owned();
    }
    let prefix: String = text.chars().take(limit).collect();
    truncate_with_total(&prefix, total, limit)
}

/// Preview of a streamed body from its leading bytes
///
/// `total_chars` is the character count of the whole body, counted while
/// it streamed past; `head` must hold more than `limit` characters whenever
/// the body does.
pub fn head_preview(head: &[u8], total_chars: usize, limit: usize) -> String {
    let text = String::from_utf8_lossy(head);
    if total_chars <= limit {
        return text.into_owned();
    }
    let prefix: String = text.chars().take(limit).collect();
    truncate_with_total(&prefix, total_chars, limit)
}

/// Characters in a UTF-8 byte run, counted by lead bytes
pub fn count_chars(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| (**b & 0xC0) != 0x80).count()
}

fn truncate_with_total(prefix: &str, total: usize, limit: usize) -> String {
    let mut keep = limit;
    loop {
        let marker = format!("…(+{})", total - keep);
        let marker_len = marker.chars().count();
        if marker_len > limit {
            return prefix.chars().take(limit).collect();
        }
        let next_keep = limit - marker_len;
        if next_keep == keep {
            let mut out: String = prefix.chars().take(keep).collect();
            out.push_str(&marker);
            return out;
        }
        keep = next_keep;
    }
}
