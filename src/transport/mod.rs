//! Boundary-preserving envelope transports.
//!
//! A [`Transport`] moves one [`Envelope`](crate::envelope::Envelope) at a
//! time; framing (newline-delimited JSON, WebSocket text frames, or an
//! in-process queue) is the transport's concern, not the channel's.

mod inprocess;
mod tcp;
mod websocket;

pub use inprocess::{connect as connect_inprocess, InProcessListener, InProcessTransport};
pub use tcp::{TcpTransport, TcpTransportListener};
pub use websocket::WebSocketTransport;

use async_trait::async_trait;

use crate::envelope::{CompressionOption, Envelope, EncryptionOption};
use crate::error::TransportError;

/// A full-duplex, envelope-framed connection to one peer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Resolves to `Ok(None)` when the peer closed the connection cleanly.
    async fn receive(&mut self) -> Result<Option<Envelope>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Upgrades the transport in place to the given encryption option.
    /// Transports that only support `None` return `UnsupportedEncryption`.
    async fn set_encryption(&mut self, option: EncryptionOption) -> Result<(), TransportError> {
        match option {
            EncryptionOption::None => Ok(()),
            other => Err(TransportError::UnsupportedEncryption(other)),
        }
    }

    async fn set_compression(&mut self, option: CompressionOption) -> Result<(), TransportError> {
        match option {
            CompressionOption::None => Ok(()),
            other => Err(TransportError::UnsupportedCompression(other)),
        }
    }

    fn supported_encryption_options(&self) -> Vec<EncryptionOption> {
        vec![EncryptionOption::None]
    }

    fn supported_compression_options(&self) -> Vec<CompressionOption> {
        vec![CompressionOption::None]
    }

    fn local_address(&self) -> Option<String> {
        None
    }

    fn remote_address(&self) -> Option<String> {
        None
    }
}

/// Accepts inbound transports of one kind. The server holds one listener per
/// configured transport and drives them all from its accept loop.
#[async_trait]
pub trait TransportListener: Send + Sync {
    async fn accept(&mut self) -> Result<Box<dyn Transport>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;

    fn local_address(&self) -> Option<String> {
        None
    }
}
