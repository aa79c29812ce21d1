//! Persistent connection interception
//!
//! The record is appended as soon as the connection is requested and then
//! follows the connection through its states. With message logging on,
//! every message sent or received becomes its own event entry.

use super::{SocketConnection, SocketMessage, SocketTransport};
use crate::error::TransportError;
use crate::record::{CapturedRequest, TransportKind};
use crate::session::{ConnectionState, Core};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Pseudo-verb recorded for connection records
const SOCKET_METHOD: &str = "WS";

pub(crate) struct SocketInterceptor {
    inner: Arc<dyn SocketTransport>,
    core: Weak<Core>,
}

impl SocketInterceptor {
    pub(crate) fn new(inner: Arc<dyn SocketTransport>, core: Weak<Core>) -> Self {
        Self { inner, core }
    }
}

impl SocketTransport for SocketInterceptor {
    fn connect(
        &self,
        url: &str,
        protocols: &[String],
    ) -> BoxFuture<'static, Result<Box<dyn SocketConnection>, TransportError>> {
        let Some(core) = Core::active(&self.core) else {
            return self.inner.connect(url, protocols);
        };

        let mut headers = BTreeMap::new();
        if !protocols.is_empty() {
            headers.insert("sec-websocket-protocol".to_string(), protocols.join(", "));
        }
        let mut record = core.partial(TransportKind::Socket, SOCKET_METHOD, url, headers, None);
        record.status_text = "connecting".to_string();
        let resolved = record.url.clone();
        let id = core.append(record);

        let connecting = self.inner.connect(url, protocols);
        let core = Arc::downgrade(&core);

        Box::pin(async move {
            match connecting.await {
                Ok(connection) => {
                    if let Some(core) = core.upgrade() {
                        core.update_connection(id, ConnectionState::Open);
                    }
                    Ok(Box::new(CapturedConnection {
                        inner: connection,
                        core,
                        id,
                        url: resolved,
                        closed: false,
                    }) as Box<dyn SocketConnection>)
                }
                Err(e) => {
                    if let Some(core) = core.upgrade() {
                        core.update_connection(id, ConnectionState::Error(e.to_string()));
                    }
                    Err(e)
                }
            }
        })
    }
}

/// Open connection that reports state changes and, optionally, messages
struct CapturedConnection {
    inner: Box<dyn SocketConnection>,
    core: Weak<Core>,
    id: u64,
    url: String,
    closed: bool,
}

impl CapturedConnection {
    fn set_state(&mut self, state: ConnectionState) {
        if matches!(state, ConnectionState::Closed | ConnectionState::Error(_)) {
            self.closed = true;
        }
        if let Some(core) = self.core.upgrade() {
            core.update_connection(self.id, state);
        }
    }

    fn log_message(&self, method: &str, message: &SocketMessage) {
        let Some(core) = Core::active(&self.core) else {
            return;
        };
        if !core.config().log_socket_messages {
            return;
        }

        let mut record = CapturedRequest::new(TransportKind::SocketMessage, method, self.url.clone());
        record.monotonic_start = core.now_ms();
        record.request_body_preview = message.preview(core.config().body_limit);
        core.append_event(record);
    }
}

#[async_trait]
impl SocketConnection for CapturedConnection {
    async fn send(&mut self, message: SocketMessage) -> Result<(), TransportError> {
        self.log_message("SEND", &message);
        self.inner.send(message).await
    }

    async fn recv(&mut self) -> Option<Result<SocketMessage, TransportError>> {
        let next = self.inner.recv().await;
        match &next {
            Some(Ok(message)) => self.log_message("RECV", message),
            Some(Err(e)) => self.set_state(ConnectionState::Error(e.to_string())),
            None => self.set_state(ConnectionState::Closed),
        }
        next
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.set_state(ConnectionState::Closing);
        let result = self.inner.close().await;
        match &result {
            Ok(()) => self.set_state(ConnectionState::Closed),
            Err(e) => self.set_state(ConnectionState::Error(e.to_string())),
        }
        result
    }
}

impl Drop for CapturedConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.set_state(ConnectionState::Closed);
        }
    }
}
