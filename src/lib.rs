//! LIME: a symmetric, session-oriented envelope exchange protocol.
//!
//! A [`transport::Transport`] carries boundary-preserving JSON frames. A
//! [`session_machine::ClientHandshake`] or [`session_machine::ServerHandshake`]
//! drives the transport through negotiation and authentication until the
//! session reaches `established`, at which point it is handed to a
//! [`channel::Channel`] for full-duplex, multiplexed envelope exchange.
//! [`multiplexer::EnvelopeMultiplexer`] and [`server::Server`] build
//! application-level dispatch and connection management on top of that.

pub mod auth;
pub mod builder;
pub mod channel;
pub mod document;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod media_type;
pub mod module;
pub mod multiplexer;
pub mod reason;
pub mod server;
pub mod session_machine;
pub mod transport;

pub use auth::{AuthenticationResult, Authenticator, GuestAuthenticator, PlainAuthenticator, Role};
pub use builder::ServerBuilder;
pub use channel::Channel;
pub use document::{Document, RawDocument};
pub use envelope::{
    AuthenticationScheme, Command, CommandMethod, CommandStatus, CompressionOption, Envelope,
    EnvelopeBase, EnvelopeKind, EncryptionOption, Message, Notification, NotificationEvent,
    SessionEnvelope, SessionState,
};
pub use error::{ChannelError, HandshakeError, ProtocolError, ServerError, TransportError};
pub use identity::{Identity, Node};
pub use media_type::MediaType;
pub use module::{ChannelModule, TracingModule};
pub use multiplexer::{request_command, CommandResponse, EnvelopeMultiplexer, RequestCommand};
pub use reason::Reason;
pub use server::{ConnectionHandler, FinishedHandler, Server};
pub use session_machine::{
    default_register, ClientHandshake, ClientHandshakeConfig, HandshakeOutcome, RegisterCallback,
    ServerHandshake, ServerHandshakeConfig,
};
