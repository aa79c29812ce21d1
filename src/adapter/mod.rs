//! Real network implementations of the transport capabilities

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "ws")]
pub mod ws;

#[cfg(all(feature = "http", feature = "ws"))]
impl crate::transport::Transports {
    /// reqwest for the HTTP entry points, tokio-tungstenite for sockets
    pub fn http_default() -> crate::error::Result<Self> {
        use std::sync::Arc;

        let http = Arc::new(http::ReqwestTransport::new()?);
        Ok(Self {
            request: http.clone(),
            streaming: http.clone(),
            beacon: http,
            socket: Arc::new(ws::TungsteniteTransport),
        })
    }
}
