//! Transport capabilities and the host that holds them
//!
//! The four entry points a page can send traffic through are modeled as
//! trait objects. Application code always calls through a [`TransportHost`];
//! a capture session swaps interceptors into the host on start and swaps the
//! saved originals back on stop, so the host is the only place where
//! "patching" happens.
//!
//! Entry points that suspend return a boxed `'static` future instead of
//! being `async fn`s. This keeps the interceptor's capture step synchronous:
//! it runs when the call is made, before the returned future is polled.

mod beacon;
mod pending;
mod request;
mod socket;
mod streaming;

use crate::body::{truncate_preview, RequestBody};
use crate::error::TransportError;
use crate::session::Core;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Ordered, case-insensitive headers collection
///
/// Repeated names are kept and read back joined with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCollection {
    entries: Vec<(String, String)>,
}

impl HeaderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into().to_ascii_lowercase(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Headers in any of the shapes a caller may supply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderInit {
    Collection(HeaderCollection),
    Pairs(Vec<(String, String)>),
    Map(HashMap<String, String>),
}

impl Default for HeaderInit {
    fn default() -> Self {
        HeaderInit::Pairs(Vec::new())
    }
}

impl HeaderInit {
    /// Lower-cased name to value mapping
    pub fn normalize(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        match self {
            HeaderInit::Collection(collection) => {
                for (name, _) in collection.iter() {
                    if !out.contains_key(name) {
                        if let Some(value) = collection.get(name) {
                            out.insert(name.to_string(), value);
                        }
                    }
                }
            }
            HeaderInit::Pairs(pairs) => {
                for (name, value) in pairs {
                    out.insert(name.to_ascii_lowercase(), value.clone());
                }
            }
            HeaderInit::Map(map) => {
                for (name, value) in map {
                    out.insert(name.to_ascii_lowercase(), value.clone());
                }
            }
        }
        out
    }

    fn push(&mut self, name: String, value: String) {
        match self {
            HeaderInit::Collection(collection) => collection.append(name, value),
            HeaderInit::Pairs(pairs) => pairs.push((name, value)),
            HeaderInit::Map(map) => {
                map.insert(name, value);
            }
        }
    }
}

/// Outgoing HTTP request as supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// None means GET
    pub method: Option<String>,
    pub url: String,
    pub headers: HeaderInit,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<RequestBody>) -> Self {
        Self {
            method: Some("POST".to_string()),
            url: url.into(),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderInit) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Upper-cased method, defaulting to GET
    pub fn effective_method(&self) -> String {
        self.method
            .as_deref()
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| "GET".to_string())
    }
}

/// Fully received HTTP response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Declared `content-length`, if present and numeric
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
    }
}

/// A message on a persistent connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl SocketMessage {
    pub fn preview(&self, limit: usize) -> String {
        match self {
            SocketMessage::Text(text) => truncate_preview(text, limit),
            SocketMessage::Binary(data) => format!("[binary {} bytes]", data.len()),
        }
    }
}

/// Simple request: one call, one complete response
pub trait RequestTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>>;
}

/// Streaming request: the response body arrives in chunks
pub trait StreamingTransport: Send + Sync {
    fn open(
        &self,
        request: HttpRequest,
    ) -> BoxFuture<'static, Result<Box<dyn ResponseStream>, TransportError>>;
}

/// Response whose headers have arrived and whose body is still streaming
#[async_trait]
pub trait ResponseStream: Send {
    fn status(&self) -> u16;

    fn status_text(&self) -> String;

    fn content_length(&self) -> Option<u64> {
        None
    }

    /// Next body chunk; None once the body is complete
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, TransportError>>;
}

/// Fire-and-forget delivery; returns whether the payload was queued
pub trait BeaconTransport: Send + Sync {
    fn send_beacon(&self, url: &str, body: Option<RequestBody>) -> bool;
}

/// Persistent bidirectional connections
pub trait SocketTransport: Send + Sync {
    fn connect(
        &self,
        url: &str,
        protocols: &[String],
    ) -> BoxFuture<'static, Result<Box<dyn SocketConnection>, TransportError>>;
}

/// An open persistent connection
#[async_trait]
pub trait SocketConnection: Send {
    async fn send(&mut self, message: SocketMessage) -> Result<(), TransportError>;

    /// Next incoming message; None once the peer has closed
    async fn recv(&mut self) -> Option<Result<SocketMessage, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// One implementation of each transport entry point
#[derive(Clone)]
pub struct Transports {
    pub request: Arc<dyn RequestTransport>,
    pub streaming: Arc<dyn StreamingTransport>,
    pub beacon: Arc<dyn BeaconTransport>,
    pub socket: Arc<dyn SocketTransport>,
}

fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Transports {
    /// True when all four entry points are the very same objects
    pub fn same_as(&self, other: &Transports) -> bool {
        same_object(&self.request, &other.request)
            && same_object(&self.streaming, &other.streaming)
            && same_object(&self.beacon, &other.beacon)
            && same_object(&self.socket, &other.socket)
    }
}

/// Wrap each of `originals` in its capturing interceptor
pub(crate) fn intercept(originals: &Transports, core: Weak<Core>) -> Transports {
    Transports {
        request: Arc::new(request::RequestInterceptor::new(
            Arc::clone(&originals.request),
            core.clone(),
        )),
        streaming: Arc::new(streaming::StreamingInterceptor::new(
            Arc::clone(&originals.streaming),
            core.clone(),
        )),
        beacon: Arc::new(beacon::BeaconInterceptor::new(
            Arc::clone(&originals.beacon),
            core.clone(),
        )),
        socket: Arc::new(socket::SocketInterceptor::new(
            Arc::clone(&originals.socket),
            core,
        )),
    }
}

/// Holds the currently installed transports
///
/// The equivalent of the page's global entry points: callers look the
/// transport up on every call, so a swap takes effect for the next call.
pub struct TransportHost {
    slots: RwLock<Transports>,
}

impl TransportHost {
    pub fn new(transports: Transports) -> Self {
        Self {
            slots: RwLock::new(transports),
        }
    }

    pub fn snapshot(&self) -> Transports {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request(&self) -> Arc<dyn RequestTransport> {
        self.snapshot().request
    }

    pub fn streaming(&self) -> Arc<dyn StreamingTransport> {
        self.snapshot().streaming
    }

    pub fn beacon(&self) -> Arc<dyn BeaconTransport> {
        self.snapshot().beacon
    }

    pub fn socket(&self) -> Arc<dyn SocketTransport> {
        self.snapshot().socket
    }

    /// Install `transports`, returning what was installed before
    pub(crate) fn replace(&self, transports: Transports) -> Transports {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slots, transports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_joins_repeated_names() {
        let mut collection = HeaderCollection::new();
        collection.append("Accept", "text/html");
        collection.append("accept", "application/json");
        collection.append("X-Trace", "1");
        let headers = HeaderInit::Collection(collection).normalize();
        assert_eq!(headers["accept"], "text/html, application/json");
        assert_eq!(headers["x-trace"], "1");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_pairs_and_map_lowercase_names() {
        let pairs = HeaderInit::Pairs(vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ]);
        let normalized = pairs.normalize();
        assert_eq!(normalized["content-type"], "application/json");
        assert_eq!(normalized["x-requested-with"], "XMLHttpRequest");

        let mut map = HashMap::new();
        map.insert("Authorization".to_string(), "Bearer t".to_string());
        let normalized = HeaderInit::Map(map).normalize();
        assert_eq!(normalized["authorization"], "Bearer t");
    }

    #[test]
    fn test_effective_method_defaults_to_get() {
        assert_eq!(HttpRequest::get("https://a.test/").effective_method(), "GET");
        let request = HttpRequest::get("https://a.test/").with_method("patch");
        assert_eq!(request.effective_method(), "PATCH");
    }

    #[test]
    fn test_builder_headers_keep_shape() {
        let request = HttpRequest::get("https://a.test/")
            .with_headers(HeaderInit::Collection(HeaderCollection::new()))
            .with_header("X-A", "1");
        assert!(matches!(request.headers, HeaderInit::Collection(_)));
        assert_eq!(request.headers.normalize()["x-a"], "1");
    }

    #[test]
    fn test_content_length_parsing() {
        let mut response = HttpResponse::new(200, b"abc".to_vec());
        assert_eq!(response.content_length(), None);
        response
            .headers
            .push(("Content-Length".to_string(), " 2048 ".to_string()));
        assert_eq!(response.content_length(), Some(2048));
    }

    #[test]
    fn test_socket_message_preview() {
        assert_eq!(SocketMessage::Text("hi".to_string()).preview(10), "hi");
        assert_eq!(
            SocketMessage::Binary(vec![0; 4]).preview(10),
            "[binary 4 bytes]"
        );
    }
}
