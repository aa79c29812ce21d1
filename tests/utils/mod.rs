// Integration test utilities
//
// In-memory transports that stand in for the network, plus session helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::future::BoxFuture;
use sonda::context::{FixedStackCapture, NoStackCapture};
use sonda::transport::{
    BeaconTransport, HttpRequest, HttpResponse, RequestTransport, ResponseStream, SocketConnection,
    SocketMessage, SocketTransport, StreamingTransport, TransportHost, Transports,
};
use sonda::{CaptureConfig, RequestBody, Session, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted simple-request transport
#[derive(Default)]
pub struct MockHttp {
    pub script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    pub calls: Mutex<Vec<HttpRequest>>,
    pub delay: Option<Duration>,
    /// Extra delay for URLs containing the given text
    pub slow_url: Option<(String, Duration)>,
}

impl MockHttp {
    pub fn respond(&self, result: Result<HttpResponse, TransportError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl RequestTransport for MockHttp {
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        let delay = match &self.slow_url {
            Some((part, slow)) if request.url.contains(part.as_str()) => Some(*slow),
            _ => self.delay,
        };
        self.calls.lock().unwrap().push(request);
        let result = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ok_response(b"ok")));
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

pub fn ok_response(body: &[u8]) -> HttpResponse {
    HttpResponse {
        status: 200,
        status_text: "OK".to_string(),
        headers: Vec::new(),
        body: body.to_vec(),
    }
}

/// Streaming transport whose body is a fixed list of chunks
#[derive(Default)]
pub struct MockStreaming {
    pub status: u16,
    pub content_length: Option<u64>,
    pub chunks: Vec<Result<Vec<u8>, TransportError>>,
    pub fail_open: Option<TransportError>,
}

impl StreamingTransport for MockStreaming {
    fn open(
        &self,
        _request: HttpRequest,
    ) -> BoxFuture<'static, Result<Box<dyn ResponseStream>, TransportError>> {
        let result = match &self.fail_open {
            Some(e) => Err(e.clone()),
            None => Ok(Box::new(MockStream {
                status: self.status,
                content_length: self.content_length,
                chunks: self.chunks.clone().into(),
            }) as Box<dyn ResponseStream>),
        };
        Box::pin(async move { result })
    }
}

pub struct MockStream {
    status: u16,
    content_length: Option<u64>,
    chunks: VecDeque<Result<Vec<u8>, TransportError>>,
}

#[async_trait]
impl ResponseStream for MockStream {
    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> String {
        if self.status == 200 {
            "OK".to_string()
        } else {
            String::new()
        }
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        self.chunks.pop_front()
    }
}

/// Beacon transport that queues or rejects everything
pub struct MockBeacon {
    pub accept: bool,
    pub calls: Mutex<Vec<String>>,
}

impl Default for MockBeacon {
    fn default() -> Self {
        Self {
            accept: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl BeaconTransport for MockBeacon {
    fn send_beacon(&self, url: &str, _body: Option<RequestBody>) -> bool {
        self.calls.lock().unwrap().push(url.to_string());
        self.accept
    }
}

/// Socket transport serving a fixed list of inbound messages
#[derive(Default)]
pub struct MockSocket {
    pub inbound: Vec<SocketMessage>,
    pub fail_connect: Option<TransportError>,
    pub sent: Arc<Mutex<Vec<SocketMessage>>>,
}

impl SocketTransport for MockSocket {
    fn connect(
        &self,
        _url: &str,
        _protocols: &[String],
    ) -> BoxFuture<'static, Result<Box<dyn SocketConnection>, TransportError>> {
        let result = match &self.fail_connect {
            Some(e) => Err(e.clone()),
            None => Ok(Box::new(MockConnection {
                inbound: self.inbound.clone().into(),
                sent: Arc::clone(&self.sent),
            }) as Box<dyn SocketConnection>),
        };
        Box::pin(async move { result })
    }
}

pub struct MockConnection {
    inbound: VecDeque<SocketMessage>,
    sent: Arc<Mutex<Vec<SocketMessage>>>,
}

#[async_trait]
impl SocketConnection for MockConnection {
    async fn send(&mut self, message: SocketMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<SocketMessage, TransportError>> {
        self.inbound.pop_front().map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// One mock of each transport, kept for assertions
pub struct Mocks {
    pub http: Arc<MockHttp>,
    pub streaming: Arc<MockStreaming>,
    pub beacon: Arc<MockBeacon>,
    pub socket: Arc<MockSocket>,
}

impl Default for Mocks {
    fn default() -> Self {
        Self {
            http: Arc::new(MockHttp::default()),
            streaming: Arc::new(MockStreaming {
                status: 200,
                chunks: vec![Ok(b"hello ".to_vec()), Ok(b"world".to_vec())],
                ..MockStreaming::default()
            }),
            beacon: Arc::new(MockBeacon::default()),
            socket: Arc::new(MockSocket::default()),
        }
    }
}

impl Mocks {
    pub fn transports(&self) -> Transports {
        Transports {
            request: self.http.clone(),
            streaming: self.streaming.clone(),
            beacon: self.beacon.clone(),
            socket: self.socket.clone(),
        }
    }

    pub fn host(&self) -> Arc<TransportHost> {
        Arc::new(TransportHost::new(self.transports()))
    }
}

/// Session without stack capture, so tags depend only on the traffic
pub fn session(config: CaptureConfig) -> Session {
    Session::builder(config)
        .stack_capture(NoStackCapture)
        .build()
        .unwrap()
}

/// Session whose every call appears to come from `stack`
pub fn session_with_stack(config: CaptureConfig, stack: &str) -> Session {
    Session::builder(config)
        .stack_capture(FixedStackCapture(stack.to_string()))
        .build()
        .unwrap()
}

/// A browser-style trace whose caller frame is `frame`
pub fn browser_stack(frame: &str) -> String {
    format!(
        "Error\n    at capture (https://cdn.test/sonda.js:1:1)\n    at wrapped (https://cdn.test/sonda.js:2:1)\n    at {}",
        frame
    )
}
