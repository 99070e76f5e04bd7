//! Drives the `new -> negotiating -> authenticating -> established` (or
//! `-> finishing -> finished/failed`) handshake directly over a
//! [`Transport`](crate::transport::Transport), before any
//! [`Channel`](crate::channel::Channel) is constructed. Encryption is
//! upgraded in place on the same transport during `negotiating`, so the
//! channel that wraps the transport afterwards never has to renegotiate it.
//! The `finishing`/`finished` phase, by contrast, runs after the transport
//! has been handed to a `Channel` and is driven by [`crate::channel::Channel::finish`].

mod client;
mod server;

pub use client::{ClientHandshake, ClientHandshakeConfig};
pub use server::{default_register, RegisterCallback, ServerHandshake, ServerHandshakeConfig};

use std::time::Duration;

use crate::auth::Role;
use crate::identity::Node;

pub(crate) const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a completed handshake settles: the session id both sides now agree
/// on, the role the server granted, and the local/remote node each side
/// will use to default `from`/`to` on the [`crate::channel::Channel`] built
/// over this transport.
#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    pub session_id: String,
    pub role: Role,
    pub local_node: Node,
    pub remote_node: Node,
}
