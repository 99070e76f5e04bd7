//! The full-duplex envelope multiplexer over one [`Transport`].
//!
//! A [`Channel`] owns the transport exclusively inside a single worker
//! task, `select!`-ing between the outbound queue and the transport's
//! `receive()` so that one direction never blocks the other behind a lock.
//! Inbound envelopes fan out into one queue per kind. This mirrors the
//! request/response correlation the teacher's reliable control channel
//! performs over a datagram transport, generalized here to all four
//! envelope kinds and a full in-memory correlation table instead of a
//! single outstanding request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::envelope::{Command, Envelope, Message, Notification, SessionEnvelope, SessionState};
use crate::error::{ChannelError, ProtocolError};
use crate::identity::Node;
use crate::module::ChannelModule;
use crate::transport::Transport;

const QUEUE_CAPACITY: usize = 256;

type PendingCommands = Arc<SyncMutex<HashMap<String, oneshot::Sender<Command>>>>;
type FinishWaiter = Arc<SyncMutex<Option<oneshot::Sender<bool>>>>;

/// A full-duplex connection to one peer, multiplexing the four envelope
/// kinds and correlating command requests with their responses.
pub struct Channel {
    outbound_tx: mpsc::Sender<Envelope>,
    messages_rx: Mutex<mpsc::Receiver<Message>>,
    notifications_rx: Mutex<mpsc::Receiver<Notification>>,
    commands_rx: Mutex<mpsc::Receiver<Command>>,
    sessions_rx: Mutex<mpsc::Receiver<SessionEnvelope>>,
    pending_commands: PendingCommands,
    finish_waiter: FinishWaiter,
    closed: Arc<AtomicBool>,
    closed_rx: watch::Receiver<bool>,
    session_id: String,
    worker: JoinHandle<()>,
}

impl Channel {
    /// Spawns the worker task over `transport` and takes ownership of it.
    /// `modules` runs, in order, over every envelope crossing the channel
    /// in either direction. `local_node`/`remote_node` default `from`/`to`
    /// on outbound envelopes that don't set them; `session_id` is this
    /// channel's handshake-assigned session id, used by [`Channel::finish`].
    pub fn new(
        transport: Box<dyn Transport>,
        modules: Vec<Arc<dyn ChannelModule>>,
        session_id: impl Into<String>,
        local_node: Node,
        remote_node: Node,
    ) -> Self {
        let session_id = session_id.into();
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (messages_tx, messages_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (notifications_tx, notifications_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (sessions_tx, sessions_rx) = mpsc::channel(QUEUE_CAPACITY);

        let pending_commands: PendingCommands = Arc::new(SyncMutex::new(HashMap::new()));
        let finish_waiter: FinishWaiter = Arc::new(SyncMutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));
        let (closed_tx, closed_rx) = watch::channel(false);

        let worker = tokio::spawn(run_loop(
            transport,
            modules,
            pending_commands.clone(),
            finish_waiter.clone(),
            closed.clone(),
            closed_tx,
            session_id.clone(),
            local_node,
            remote_node,
            outbound_rx,
            messages_tx,
            notifications_tx,
            commands_tx,
            sessions_tx,
        ));

        Self {
            outbound_tx,
            messages_rx: Mutex::new(messages_rx),
            notifications_rx: Mutex::new(notifications_rx),
            commands_rx: Mutex::new(commands_rx),
            sessions_rx: Mutex::new(sessions_rx),
            pending_commands,
            finish_waiter,
            closed,
            closed_rx,
            session_id,
            worker,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn send_message(&self, message: Message) -> Result<(), ChannelError> {
        self.send(Envelope::Message(message)).await
    }

    pub async fn send_notification(&self, notification: Notification) -> Result<(), ChannelError> {
        self.send(Envelope::Notification(notification)).await
    }

    pub async fn send_session(&self, session: SessionEnvelope) -> Result<(), ChannelError> {
        self.send(Envelope::Session(session)).await
    }

    /// Sends a command request and waits for the correlated response. Fails
    /// without sending if `command`'s id is already reserved by another
    /// in-flight request.
    pub async fn process_command(
        &self,
        command: Command,
        timeout_duration: Duration,
    ) -> Result<Command, ChannelError> {
        let id = command.base.id.clone();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending_commands.lock();
            if pending.contains_key(&id) {
                return Err(ChannelError::Protocol(ProtocolError::DuplicateCommandId(id)));
            }
            pending.insert(id.clone(), tx);
        }

        if let Err(err) = self.send(Envelope::Command(command)).await {
            self.pending_commands.lock().remove(&id);
            return Err(err);
        }

        match timeout(timeout_duration, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => {
                self.pending_commands.lock().remove(&id);
                Err(ChannelError::CommandTimeout(id))
            }
        }
    }

    /// Sends a command without registering for correlation; used for
    /// fire-and-forget subscriptions or when the caller reads responses
    /// from [`receive_command`] itself.
    pub async fn send_command(&self, command: Command) -> Result<(), ChannelError> {
        self.send(Envelope::Command(command)).await
    }

    pub async fn receive_message(&self) -> Option<Message> {
        self.messages_rx.lock().await.recv().await
    }

    pub async fn receive_notification(&self) -> Option<Notification> {
        self.notifications_rx.lock().await.recv().await
    }

    /// Yields commands that were not claimed by a pending
    /// [`process_command`] correlation: requests from the peer, and
    /// unsolicited responses that arrive after their waiter already timed
    /// out.
    pub async fn receive_command(&self) -> Option<Command> {
        self.commands_rx.lock().await.recv().await
    }

    pub async fn receive_session(&self) -> Option<SessionEnvelope> {
        self.sessions_rx.lock().await.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the channel's worker task has stopped, however that
    /// happened (peer disconnect, [`Channel::close`], or a completed
    /// [`Channel::finish`]).
    pub async fn closed(&self) {
        let mut rx = self.closed_rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.worker.abort();
    }

    /// The initiating side of a graceful shutdown: sends `{state:finishing}`
    /// on the established session and waits for the peer's `{state:finished}`
    /// (or `{state:failed}`) before closing the transport.
    pub async fn finish(&self) -> Result<(), ChannelError> {
        let (tx, rx) = oneshot::channel();
        *self.finish_waiter.lock() = Some(tx);
        self.send_session(SessionEnvelope::new(self.session_id.clone(), SessionState::Finishing))
            .await?;
        let finished_cleanly = rx.await.map_err(|_| ChannelError::Closed)?;
        self.closed().await;
        if finished_cleanly {
            Ok(())
        } else {
            Err(ChannelError::Closed)
        }
    }

    async fn send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.outbound_tx
            .send(envelope)
            .await
            .map_err(|_| ChannelError::Closed)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    mut transport: Box<dyn Transport>,
    modules: Vec<Arc<dyn ChannelModule>>,
    pending_commands: PendingCommands,
    finish_waiter: FinishWaiter,
    closed: Arc<AtomicBool>,
    closed_tx: watch::Sender<bool>,
    session_id: String,
    local_node: Node,
    remote_node: Node,
    mut outbound_rx: mpsc::Receiver<Envelope>,
    messages_tx: mpsc::Sender<Message>,
    notifications_tx: mpsc::Sender<Notification>,
    commands_tx: mpsc::Sender<Command>,
    sessions_tx: mpsc::Sender<SessionEnvelope>,
) {
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                let Some(mut envelope) = outbound else {
                    break;
                };
                let base = envelope.base_mut();
                if base.from.is_none() {
                    base.from = Some(local_node.clone());
                }
                if base.to.is_none() {
                    base.to = Some(remote_node.clone());
                }
                let mut current = Some(envelope);
                for module in &modules {
                    let Some(value) = current.take() else {
                        break;
                    };
                    current = module.on_sending(value);
                    if current.is_none() {
                        break;
                    }
                }
                let Some(envelope) = current else {
                    continue;
                };
                if let Err(err) = transport.send(&envelope).await {
                    tracing::warn!(target: "lime::channel", error = %err, "transport write failed");
                    break;
                }
            }
            received = transport.receive() => {
                let envelope = match received {
                    Ok(Some(envelope)) => envelope,
                    Ok(None) => {
                        tracing::debug!(target: "lime::channel", "peer closed transport");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(target: "lime::channel", error = %err, "transport read failed");
                        break;
                    }
                };

                let mut current = Some(envelope);
                for module in &modules {
                    let Some(value) = current.take() else {
                        break;
                    };
                    current = module.on_receiving(value);
                    if current.is_none() {
                        break;
                    }
                }
                let Some(envelope) = current else {
                    continue;
                };

                if let Envelope::Session(session) = &envelope {
                    match session.state {
                        SessionState::Finishing => {
                            let mut finished = SessionEnvelope::new(session_id.clone(), SessionState::Finished);
                            finished.base.from = Some(local_node.clone());
                            finished.base.to = Some(remote_node.clone());
                            let _ = transport.send(&Envelope::Session(finished)).await;
                            tracing::debug!(target: "lime::channel", session_id = %session_id, "finished session on peer's request");
                            break;
                        }
                        SessionState::Finished => {
                            if let Some(tx) = finish_waiter.lock().take() {
                                let _ = tx.send(true);
                            }
                            break;
                        }
                        SessionState::Failed => {
                            if let Some(tx) = finish_waiter.lock().take() {
                                let _ = tx.send(false);
                                break;
                            }
                        }
                        _ => {}
                    }
                }

                let dispatched = match envelope {
                    Envelope::Message(message) => messages_tx.send(message).await.is_ok(),
                    Envelope::Notification(notification) => {
                        notifications_tx.send(notification).await.is_ok()
                    }
                    Envelope::Session(session) => sessions_tx.send(session).await.is_ok(),
                    Envelope::Command(command) => {
                        if command.is_response() {
                            let waiter = pending_commands.lock().remove(&command.base.id);
                            match waiter {
                                Some(tx) => tx.send(command).is_ok(),
                                None => commands_tx.send(command).await.is_ok(),
                            }
                        } else {
                            commands_tx.send(command).await.is_ok()
                        }
                    }
                };
                if !dispatched {
                    break;
                }
            }
        }
    }
    let _ = transport.close().await;
    closed.store(true, Ordering::Release);
    let _ = closed_tx.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CommandMethod, NotificationEvent};
    use crate::media_type::MediaType;
    use crate::transport::InProcessTransport;
    use std::str::FromStr;

    fn channel_pair() -> (Channel, Channel) {
        let (a, b) = InProcessTransport::pair();
        let client_node = Node::from_str("client@local/test").unwrap();
        let server_node = Node::from_str("server@local/test").unwrap();
        (
            Channel::new(Box::new(a), Vec::new(), "session-1", client_node.clone(), server_node.clone()),
            Channel::new(Box::new(b), Vec::new(), "session-1", server_node, client_node),
        )
    }

    #[tokio::test]
    async fn delivers_a_message_to_the_matching_queue() {
        let (client, server) = channel_pair();
        let message = Message::new(MediaType::application_json(), serde_json::json!({"ping": true}));
        client.send_message(message.clone()).await.unwrap();
        let received = server.receive_message().await.unwrap();
        assert_eq!(received.base.id, message.base.id);
        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn defaults_from_and_to_on_outbound_envelopes() {
        let (client, server) = channel_pair();
        let message = Message::new(MediaType::application_json(), serde_json::json!({"ping": true}));
        client.send_message(message).await.unwrap();
        let received = server.receive_message().await.unwrap();
        assert_eq!(received.base.from.unwrap().to_string(), "client@local/test");
        assert_eq!(received.base.to.unwrap().to_string(), "server@local/test");
        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn correlates_a_command_response_with_its_request() {
        let (client, server) = channel_pair();
        let request = Command::request("cmd-1", CommandMethod::Get).with_uri("/ping");

        let server_side = tokio::spawn(async move {
            let request = server.receive_command().await.unwrap();
            let response = request.success_response_with_resource(
                MediaType::application_json(),
                serde_json::json!({"pong": true}),
            );
            server.send_command(response).await.unwrap();
            server
        });

        let response = client
            .process_command(request, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(response.is_response());
        let server = server_side.await.unwrap();
        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn unmatched_command_response_falls_back_to_the_command_queue() {
        let (client, server) = channel_pair();
        let stray = Command::request("cmd-2", CommandMethod::Get).success_response();
        server.send_command(stray.clone()).await.unwrap();
        let received = client.receive_command().await.unwrap();
        assert_eq!(received.base.id, stray.base.id);
        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn command_times_out_without_a_response() {
        let (client, server) = channel_pair();
        let request = Command::request("cmd-3", CommandMethod::Get);
        let result = client
            .process_command(request, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(ChannelError::CommandTimeout(_))));
        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn reusing_an_in_flight_command_id_fails_without_sending() {
        let (client, server) = channel_pair();
        let client = Arc::new(client);
        let first = Command::request("cmd-dup", CommandMethod::Get);
        let first_call = {
            let client = client.clone();
            tokio::spawn(async move { client.process_command(first, Duration::from_millis(200)).await })
        };

        // Give the first request time to reserve its id before the second fires.
        tokio::task::yield_now().await;
        let duplicate = Command::request("cmd-dup", CommandMethod::Get);
        let result = client.process_command(duplicate, Duration::from_millis(50)).await;
        assert!(matches!(
            result,
            Err(ChannelError::Protocol(ProtocolError::DuplicateCommandId(ref id))) if id == "cmd-dup"
        ));

        // No second request reached the server; only the original is pending.
        let request = server.receive_command().await.unwrap();
        assert_eq!(request.base.id, "cmd-dup");
        server
            .send_command(request.success_response())
            .await
            .unwrap();
        first_call.await.unwrap().unwrap();

        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn finish_exchanges_finishing_and_finished_then_closes() {
        let (client, server) = channel_pair();
        let responder = tokio::spawn(async move {
            let session = server.receive_session().await;
            assert!(session.is_none(), "finishing is handled by the worker, not surfaced to receive_session");
            server
        });

        client.finish().await.unwrap();
        assert!(client.is_closed());

        let server = responder.await.unwrap();
        server.closed().await;
        assert!(server.is_closed());
    }

    #[tokio::test]
    async fn delivers_notifications_addressed_to_a_node() {
        let (client, server) = channel_pair();
        let to = Node::from_str("alice@example.com/phone").unwrap();
        let mut notification = Notification::new("note-1", NotificationEvent::Received);
        notification.base.to = Some(to.clone());
        client.send_notification(notification.clone()).await.unwrap();
        let received = server.receive_notification().await.unwrap();
        assert_eq!(received.base.id, notification.base.id);
        assert_eq!(received.base.to.unwrap(), to);
        client.close().await;
        server.close().await;
    }
}
