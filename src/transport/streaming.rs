//! Streaming request interception
//!
//! The record completes when the caller reaches the end of the body, when
//! the body fails, or when the stream is dropped unfinished.

use super::pending::{Outcome, Pending};
use super::{HttpRequest, ResponseStream, StreamingTransport};
use crate::body::{count_chars, head_preview};
use crate::error::TransportError;
use crate::record::TransportKind;
use crate::session::Core;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::{Arc, Weak};

pub(crate) struct StreamingInterceptor {
    inner: Arc<dyn StreamingTransport>,
    core: Weak<Core>,
}

impl StreamingInterceptor {
    pub(crate) fn new(inner: Arc<dyn StreamingTransport>, core: Weak<Core>) -> Self {
        Self { inner, core }
    }
}

impl StreamingTransport for StreamingInterceptor {
    fn open(
        &self,
        request: HttpRequest,
    ) -> BoxFuture<'static, Result<Box<dyn ResponseStream>, TransportError>> {
        let Some(core) = Core::active(&self.core) else {
            return self.inner.open(request);
        };

        let pending = Pending::http(core, TransportKind::Stream, &request);
        let opened = self.inner.open(request);

        Box::pin(async move {
            match opened.await {
                Ok(stream) => {
                    let config = pending.core().config();
                    let preview_limit = config
                        .capture_response_preview
                        .then_some(config.preview_limit);
                    Ok(Box::new(CapturedStream {
                        inner: stream,
                        pending: Some(pending),
                        preview_limit,
                        head: Vec::new(),
                        seen: 0,
                        chars: 0,
                    }) as Box<dyn ResponseStream>)
                }
                Err(e) => {
                    pending.fail(&e);
                    Err(e)
                }
            }
        })
    }
}

/// Body stream that reports the request once the body is done
struct CapturedStream {
    inner: Box<dyn ResponseStream>,
    pending: Option<Pending>,
    preview_limit: Option<usize>,
    /// Leading body bytes kept for the preview
    head: Vec<u8>,
    seen: u64,
    chars: usize,
}

impl CapturedStream {
    fn keep_head(&mut self, chunk: &[u8]) {
        let Some(limit) = self.preview_limit else {
            return;
        };
        // Enough bytes for `limit` chars plus evidence that more follow.
        let cap = limit.saturating_mul(4).saturating_add(4);
        let room = cap.saturating_sub(self.head.len());
        self.head.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn complete(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let outcome = Outcome {
            status: self.inner.status(),
            status_text: self.inner.status_text(),
            size: self.inner.content_length().unwrap_or(self.seen),
            preview: self
                .preview_limit
                .map(|limit| head_preview(&self.head, self.chars, limit)),
        };
        pending.succeed(outcome);
    }
}

#[async_trait]
impl ResponseStream for CapturedStream {
    fn status(&self) -> u16 {
        self.inner.status()
    }

    fn status_text(&self) -> String {
        self.inner.status_text()
    }

    fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        let next = self.inner.next_chunk().await;
        match &next {
            Some(Ok(chunk)) => {
                self.seen += chunk.len() as u64;
                self.chars += count_chars(chunk);
                self.keep_head(chunk);
            }
            Some(Err(e)) => {
                if let Some(pending) = self.pending.take() {
                    pending.fail(e);
                }
            }
            None => self.complete(),
        }
        next
    }
}
