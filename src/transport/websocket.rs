use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use crate::envelope::{CompressionOption, Envelope, EncryptionOption};
use crate::error::TransportError;

use super::Transport;

/// One envelope per WebSocket text frame.
pub struct WebSocketTransport<S> {
    stream: WebSocketStream<S>,
    connected: bool,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream, connected: true }
    }

    /// Completes the server-side WebSocket handshake on `stream`, rejecting
    /// the upgrade unless `allow_origin` accepts the request's `Origin`
    /// header (absent header included, since browsers omit it for some
    /// same-origin requests).
    pub async fn accept_with_origin_check(
        stream: S,
        allow_origin: impl Fn(Option<&str>) -> bool + Send + Unpin + 'static,
    ) -> Result<Self, TransportError>
    where
        S: 'static,
    {
        let callback = move |request: &Request, response: Response| {
            let origin = request
                .headers()
                .get("origin")
                .and_then(|v| v.to_str().ok());
            if allow_origin(origin) {
                Ok(response)
            } else {
                let rejection: ErrorResponse = tokio_tungstenite::tungstenite::http::Response::builder()
                    .status(403)
                    .body(None::<String>)
                    .expect("static rejection response is well-formed");
                Err(rejection)
            }
        };
        let stream = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        let text = serde_json::to_string(envelope)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        self.stream
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn receive(&mut self) -> Result<Option<Envelope>, TransportError> {
        loop {
            return match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let envelope = serde_json::from_str(&text)
                        .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
                    Ok(Some(envelope))
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => {
                    self.connected = false;
                    Ok(None)
                }
                Some(Ok(other)) => Err(TransportError::WebSocket(format!(
                    "unexpected frame type: {other:?}"
                ))),
                Some(Err(e)) => {
                    self.connected = false;
                    Err(TransportError::WebSocket(e.to_string()))
                }
            };
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn supported_encryption_options(&self) -> Vec<EncryptionOption> {
        // TLS, when used, wraps the underlying stream before the WebSocket
        // handshake runs; there is no in-place upgrade at this layer.
        vec![EncryptionOption::None]
    }

    fn supported_compression_options(&self) -> Vec<CompressionOption> {
        vec![CompressionOption::None]
    }
}
