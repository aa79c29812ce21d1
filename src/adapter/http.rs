//! HTTP entry points backed by reqwest

use crate::body::RequestBody;
use crate::error::{Result, SondaError, TransportError};
use crate::transport::{
    BeaconTransport, HttpRequest, HttpResponse, RequestTransport, ResponseStream,
    StreamingTransport,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, warn};

fn network(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

/// Request, streaming and beacon transport over one shared client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SondaError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(
        client: &reqwest::Client,
        request: &HttpRequest,
    ) -> std::result::Result<reqwest::RequestBuilder, TransportError> {
        let method = reqwest::Method::from_bytes(request.effective_method().as_bytes())
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let headers = request.headers.normalize();

        let mut builder = client.request(method, &request.url);
        if let Some(body) = &request.body {
            if !headers.contains_key("content-type") {
                if let Some(content_type) = body.implied_content_type() {
                    builder = builder.header("content-type", content_type);
                }
            }
            builder = builder.body(body.to_bytes());
        }
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        Ok(builder)
    }
}

fn status_text(status: reqwest::StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

impl RequestTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, std::result::Result<HttpResponse, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = Self::build(&client, &request)?
                .send()
                .await
                .map_err(network)?;

            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();
            let body = response.bytes().await.map_err(network)?.to_vec();

            Ok(HttpResponse {
                status: status.as_u16(),
                status_text: status_text(status),
                headers,
                body,
            })
        })
    }
}

struct ReqwestStream {
    status: reqwest::StatusCode,
    content_length: Option<u64>,
    body: BoxStream<'static, std::result::Result<Vec<u8>, TransportError>>,
}

#[async_trait]
impl ResponseStream for ReqwestStream {
    fn status(&self) -> u16 {
        self.status.as_u16()
    }

    fn status_text(&self) -> String {
        status_text(self.status)
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    async fn next_chunk(&mut self) -> Option<std::result::Result<Vec<u8>, TransportError>> {
        self.body.next().await
    }
}

impl StreamingTransport for ReqwestTransport {
    fn open(
        &self,
        request: HttpRequest,
    ) -> BoxFuture<'static, std::result::Result<Box<dyn ResponseStream>, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = Self::build(&client, &request)?
                .send()
                .await
                .map_err(network)?;

            Ok(Box::new(ReqwestStream {
                status: response.status(),
                content_length: response.content_length(),
                body: response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(network))
                    .boxed(),
            }) as Box<dyn ResponseStream>)
        })
    }
}

impl BeaconTransport for ReqwestTransport {
    /// Queue a detached POST on the current tokio runtime
    ///
    /// Rejected when called outside a runtime or with an unparseable URL.
    fn send_beacon(&self, url: &str, body: Option<RequestBody>) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("beacon sent outside a tokio runtime");
            return false;
        };
        let Ok(url) = reqwest::Url::parse(url) else {
            warn!(url, "beacon URL is not absolute");
            return false;
        };

        let mut builder = self.client.post(url);
        if let Some(body) = body {
            if let Some(content_type) = body.implied_content_type() {
                builder = builder.header("content-type", content_type);
            }
            builder = builder.body(body.to_bytes());
        }

        runtime.spawn(async move {
            if let Err(e) = builder.send().await {
                debug!("beacon delivery failed: {}", e);
            }
        });
        true
    }
}
