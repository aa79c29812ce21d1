//! HAR 1.2 output format
//!
//! Only request-kind records become entries. Capture context that HAR has
//! no field for travels in the `_initiator`, `_stack` and `_tags` extension
//! fields.

use crate::error::Result;
use crate::record::CapturedRequest;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Debug, Serialize)]
pub struct HarLog {
    pub version: &'static str,
    pub creator: HarCreator,
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Serialize)]
pub struct HarCreator {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    pub started_date_time: String,
    pub time: f64,
    pub request: HarRequest,
    pub response: HarResponse,
    pub cache: serde_json::Map<String, serde_json::Value>,
    pub timings: HarTimings,
    #[serde(rename = "_initiator")]
    pub initiator: String,
    #[serde(rename = "_stack", skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(rename = "_tags")]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HarNameValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: &'static str,
    pub cookies: Vec<HarNameValue>,
    pub headers: Vec<HarNameValue>,
    pub query_string: Vec<HarNameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<HarPostData>,
    pub headers_size: i64,
    pub body_size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    pub status: u16,
    pub status_text: String,
    pub http_version: &'static str,
    pub cookies: Vec<HarNameValue>,
    pub headers: Vec<HarNameValue>,
    pub content: HarContent,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
    #[serde(rename = "_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    pub size: u64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HarTimings {
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
}

const HTTP_VERSION: &str = "HTTP/1.1";

impl HarEntry {
    pub fn from_record(record: &CapturedRequest) -> Self {
        let headers = record
            .request_headers
            .iter()
            .map(|(name, value)| HarNameValue {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();

        let query_string = url::Url::parse(&record.url)
            .map(|url| {
                url.query_pairs()
                    .map(|(name, value)| HarNameValue {
                        name: name.into_owned(),
                        value: value.into_owned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let post_data = (!record.request_body_preview.is_empty()).then(|| HarPostData {
            mime_type: record
                .request_headers
                .get("content-type")
                .cloned()
                .unwrap_or_default(),
            text: record.request_body_preview.clone(),
        });

        Self {
            started_date_time: record.timestamp_iso.clone(),
            time: record.duration_ms.max(0.0),
            request: HarRequest {
                method: record.method.clone(),
                url: record.url.clone(),
                http_version: HTTP_VERSION,
                cookies: Vec::new(),
                headers,
                query_string,
                body_size: record.request_body_preview.len() as i64,
                post_data,
                headers_size: -1,
            },
            response: HarResponse {
                status: record.status,
                status_text: record.status_text.clone(),
                http_version: HTTP_VERSION,
                cookies: Vec::new(),
                headers: Vec::new(),
                content: HarContent {
                    size: record.response_size_bytes,
                    mime_type: String::new(),
                    text: record.response_preview.clone(),
                },
                redirect_url: String::new(),
                headers_size: -1,
                body_size: record.response_size_bytes as i64,
                error: record.error_text.clone(),
            },
            cache: serde_json::Map::new(),
            timings: HarTimings {
                send: 0.0,
                wait: record.duration_ms.max(0.0),
                receive: 0.0,
            },
            initiator: record.initiator.clone(),
            stack: record.stack_trace.clone(),
            tags: record.tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }
}

/// HAR document for the request-kind records in `records`
pub fn to_har(records: &[CapturedRequest]) -> Har {
    Har {
        log: HarLog {
            version: "1.2",
            creator: HarCreator {
                name: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
            },
            entries: records
                .iter()
                .filter(|record| record.transport_kind.is_http())
                .map(HarEntry::from_record)
                .collect(),
        },
    }
}

pub fn to_har_string(records: &[CapturedRequest]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_har(records))?)
}
