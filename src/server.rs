//! Accepts connections, drives each one's handshake, and tracks
//! established sessions until the server is closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::auth::Authenticator;
use crate::channel::Channel;
use crate::envelope::{AuthenticationScheme, CompressionOption, EncryptionOption};
use crate::error::ServerError;
use crate::identity::Node;
use crate::module::ChannelModule;
use crate::session_machine::{RegisterCallback, ServerHandshake, ServerHandshakeConfig};
use crate::transport::{Transport, TransportListener};

/// Called once per connection after its session reaches `established`.
pub type ConnectionHandler = Arc<dyn Fn(Arc<Channel>) + Send + Sync>;

/// Called once a channel's worker stops, with the session id that was
/// removed from the registry.
pub type FinishedHandler = Arc<dyn Fn(String) + Send + Sync>;

/// How long [`Server::close`] waits for each session's finishing exchange
/// before giving up and closing the transport outright.
const GRACEFUL_FINISH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Server {
    listeners: Mutex<Vec<Box<dyn TransportListener>>>,
    encryption_options: Vec<EncryptionOption>,
    compression_options: Vec<CompressionOption>,
    authenticators: HashMap<AuthenticationScheme, Arc<dyn Authenticator>>,
    modules: Vec<Arc<dyn ChannelModule>>,
    server_node: Node,
    register: RegisterCallback,
    finished: Option<FinishedHandler>,
    sessions: Arc<Mutex<HashMap<String, Arc<Channel>>>>,
    accept_tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl Server {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        listeners: Vec<Box<dyn TransportListener>>,
        encryption_options: Vec<EncryptionOption>,
        compression_options: Vec<CompressionOption>,
        authenticators: HashMap<AuthenticationScheme, Arc<dyn Authenticator>>,
        modules: Vec<Arc<dyn ChannelModule>>,
        server_node: Node,
        register: RegisterCallback,
        finished: Option<FinishedHandler>,
    ) -> Self {
        Self {
            listeners: Mutex::new(listeners),
            encryption_options,
            compression_options,
            authenticators,
            modules,
            server_node,
            register,
            finished,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            accept_tasks: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns one accept loop per configured listener; each accepted
    /// connection is handshaken and, on success, registered and handed to
    /// `on_connected`.
    pub fn serve(self: Arc<Self>, on_connected: ConnectionHandler) {
        let mut listeners = self.listeners.lock();
        let drained: Vec<_> = listeners.drain(..).collect();
        drop(listeners);

        let mut tasks = Vec::new();
        for listener in drained {
            let server = self.clone();
            let on_connected = on_connected.clone();
            tasks.push(tokio::spawn(server.accept_loop(listener, on_connected)));
        }
        *self.accept_tasks.lock() = tasks;
    }

    async fn accept_loop(self: Arc<Self>, mut listener: Box<dyn TransportListener>, on_connected: ConnectionHandler) {
        loop {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            let transport = match listener.accept().await {
                Ok(transport) => transport,
                Err(err) => {
                    if self.closed.load(Ordering::Acquire) {
                        tracing::debug!(target: "lime::server", "{}", ServerError::Closed);
                        break;
                    }
                    tracing::warn!(target: "lime::server", error = %err, "accept failed");
                    continue;
                }
            };

            let server = self.clone();
            let on_connected = on_connected.clone();
            tokio::spawn(async move {
                server.handle_connection(transport, on_connected).await;
            });
        }
        let _ = listener.close().await;
    }

    async fn handle_connection(self: Arc<Self>, mut transport: Box<dyn Transport>, on_connected: ConnectionHandler) {
        let handshake = ServerHandshake::new(ServerHandshakeConfig {
            encryption_options: self.encryption_options.clone(),
            compression_options: self.compression_options.clone(),
            authenticators: self.authenticators.clone(),
            server_node: self.server_node.clone(),
            register: self.register.clone(),
        });

        let tls_capable = self.encryption_options.contains(&EncryptionOption::Tls);
        let outcome = match handshake.run(&mut transport, tls_capable).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(target: "lime::server", error = %err, "handshake failed");
                return;
            }
        };

        tracing::info!(
            target: "lime::server",
            session_id = %outcome.session_id,
            role = ?outcome.role,
            node = %outcome.remote_node,
            "session established",
        );
        let channel = Arc::new(Channel::new(
            transport,
            self.modules.clone(),
            outcome.session_id.clone(),
            outcome.local_node,
            outcome.remote_node,
        ));
        self.sessions.lock().insert(outcome.session_id.clone(), channel.clone());
        on_connected(channel.clone());

        channel.closed().await;
        self.sessions.lock().remove(&outcome.session_id);
        if let Some(finished) = &self.finished {
            finished(outcome.session_id);
        }
    }

    pub fn session(&self, session_id: &str) -> Option<Arc<Channel>> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Stops accepting new connections and, best-effort, runs the
    /// finishing/finished exchange on every live session before its
    /// transport closes. Does not wait for in-flight handshakes.
    pub async fn close(&self) -> Result<(), ServerError> {
        self.closed.store(true, Ordering::Release);
        for task in self.accept_tasks.lock().drain(..) {
            task.abort();
        }
        let sessions: Vec<_> = self.sessions.lock().values().cloned().collect();
        for channel in sessions {
            if tokio::time::timeout(GRACEFUL_FINISH_TIMEOUT, channel.finish()).await.is_err() {
                channel.close().await;
            }
        }
        Ok(())
    }
}
