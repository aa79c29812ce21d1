//! Persistent connections backed by tokio-tungstenite

use crate::error::TransportError;
use crate::transport::{SocketConnection, SocketMessage, SocketTransport};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

fn network(e: impl std::fmt::Display) -> TransportError {
    TransportError::Network(e.to_string())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteTransport;

impl SocketTransport for TungsteniteTransport {
    fn connect(
        &self,
        url: &str,
        protocols: &[String],
    ) -> BoxFuture<'static, Result<Box<dyn SocketConnection>, TransportError>> {
        let url = url.to_string();
        let protocols = protocols.join(", ");

        Box::pin(async move {
            let mut request = url.as_str().into_client_request().map_err(network)?;
            if !protocols.is_empty() {
                request.headers_mut().insert(
                    "sec-websocket-protocol",
                    HeaderValue::from_str(&protocols).map_err(network)?,
                );
            }

            let (stream, _response) = tokio_tungstenite::connect_async(request)
                .await
                .map_err(network)?;
            Ok(Box::new(TungsteniteConnection { stream }) as Box<dyn SocketConnection>)
        })
    }
}

struct TungsteniteConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SocketConnection for TungsteniteConnection {
    async fn send(&mut self, message: SocketMessage) -> Result<(), TransportError> {
        let message = match message {
            SocketMessage::Text(text) => Message::Text(text),
            SocketMessage::Binary(data) => Message::Binary(data),
        };
        self.stream.send(message).await.map_err(|e| match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
            other => network(other),
        })
    }

    async fn recv(&mut self) -> Option<Result<SocketMessage, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(SocketMessage::Text(text))),
                Ok(Message::Binary(data)) => return Some(Ok(SocketMessage::Binary(data))),
                Ok(Message::Close(_)) => return None,
                // Control frames are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(network(e))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(network(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_network_error() {
        let result = TungsteniteTransport.connect("not a url", &[]).await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TungsteniteTransport
            .connect(&format!("ws://127.0.0.1:{}/", port), &["chat".to_string()])
            .await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }
}
