//! Error types for each layer of the runtime, mirroring the boundary between
//! the byte-level transport, the envelope channel, the handshake driver, and
//! the server's accept loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport closed")]
    Closed,
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("tls error: {0}")]
    Tls(String),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("encryption option {0:?} is not supported by this transport")]
    UnsupportedEncryption(crate::envelope::EncryptionOption),
    #[error("compression option {0:?} is not supported by this transport")]
    UnsupportedCompression(crate::envelope::CompressionOption),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("command id {0} is already reserved by an outstanding request")]
    DuplicateCommandId(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("command {0} timed out waiting for a response")]
    CommandTimeout(String),
    #[error("channel is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("no common {0} option")]
    NoCommonOption(&'static str),
    #[error("authentication scheme {0:?} rejected: {1}")]
    AuthenticationRejected(crate::envelope::AuthenticationScheme, String),
    #[error("peer sent unexpected session state {0:?}, expected {1:?}")]
    UnexpectedState(crate::envelope::SessionState, crate::envelope::SessionState),
    #[error("expected a session envelope, got {0:?}")]
    NotASessionEnvelope(crate::envelope::EnvelopeKind),
    #[error("session failed: {0}")]
    Failed(crate::reason::Reason),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error("server builder misconfigured: {0}")]
    InvalidConfiguration(String),
    /// Not a failure: the accept loop stopped because [`crate::server::Server::close`]
    /// was called. Callers expect this from a clean shutdown and should not
    /// log it as a warning.
    #[error("server closed")]
    Closed,
}
