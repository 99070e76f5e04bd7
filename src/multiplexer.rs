//! Predicate-dispatched handlers over an established [`Channel`].
//!
//! Where [`crate::module::ChannelModule`] intercepts envelopes crossing the
//! wire, an [`EnvelopeMultiplexer`] dispatches already-received envelopes
//! to application handlers: each kind has an ordered list of `(predicate,
//! handler)` pairs, tried in registration order, falling back to a default
//! handler when nothing matches. Command-request handlers additionally
//! receive a [`RequestCommand`] wrapper carrying the reply capability, so a
//! handler can answer without hand-building the response envelope.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::channel::Channel;
use crate::envelope::{Command, Message, Notification, SessionEnvelope};
use crate::error::ChannelError;
use crate::media_type::MediaType;
use crate::reason::Reason;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

struct Route<T> {
    predicate: Predicate<T>,
    handler: Handler<T>,
}

struct RouteTable<T> {
    routes: Vec<Route<T>>,
    default: Option<Handler<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            default: None,
        }
    }
}

impl<T> RouteTable<T> {
    fn dispatch(&self, value: T) {
        for route in &self.routes {
            if (route.predicate)(&value) {
                (route.handler)(value);
                return;
            }
        }
        if let Some(default) = &self.default {
            default(value);
        }
    }
}

/// A command request paired with the channel it arrived on, so a handler
/// can reply without reaching back into application state to find the
/// channel or hand-build a response sharing the request's id.
pub struct RequestCommand {
    request: Command,
    channel: Arc<Channel>,
}

impl RequestCommand {
    fn new(request: Command, channel: Arc<Channel>) -> Self {
        Self { request, channel }
    }

    pub fn request(&self) -> &Command {
        &self.request
    }

    pub async fn success_response(&self) -> Result<(), ChannelError> {
        self.channel.send_command(self.request.success_response()).await
    }

    pub async fn success_response_with_resource(
        &self,
        type_: MediaType,
        resource: Value,
    ) -> Result<(), ChannelError> {
        self.channel
            .send_command(self.request.success_response_with_resource(type_, resource))
            .await
    }

    pub async fn failure_response(&self, reason: Reason) -> Result<(), ChannelError> {
        self.channel.send_command(self.request.failure_response(reason)).await
    }
}

/// Listens on a [`Channel`] and dispatches each received envelope to the
/// first matching handler, or the kind's default handler.
#[derive(Default)]
pub struct EnvelopeMultiplexer {
    messages: RouteTable<Message>,
    notifications: RouteTable<Notification>,
    commands: RouteTable<RequestCommand>,
    sessions: RouteTable<SessionEnvelope>,
}

impl EnvelopeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message(
        mut self,
        predicate: impl Fn(&Message) -> bool + Send + Sync + 'static,
        handler: impl Fn(Message) + Send + Sync + 'static,
    ) -> Self {
        self.messages.routes.push(Route { predicate: Box::new(predicate), handler: Box::new(handler) });
        self
    }

    pub fn default_message_handler(mut self, handler: impl Fn(Message) + Send + Sync + 'static) -> Self {
        self.messages.default = Some(Box::new(handler));
        self
    }

    pub fn on_notification(
        mut self,
        predicate: impl Fn(&Notification) -> bool + Send + Sync + 'static,
        handler: impl Fn(Notification) + Send + Sync + 'static,
    ) -> Self {
        self.notifications
            .routes
            .push(Route { predicate: Box::new(predicate), handler: Box::new(handler) });
        self
    }

    pub fn default_notification_handler(
        mut self,
        handler: impl Fn(Notification) + Send + Sync + 'static,
    ) -> Self {
        self.notifications.default = Some(Box::new(handler));
        self
    }

    /// Registers a handler for command requests whose predicate matches the
    /// inbound [`Command`]. The handler receives a [`RequestCommand`]
    /// exposing `success_response`/`success_response_with_resource`/
    /// `failure_response`; since those are async, a handler that wants to
    /// reply spawns a task, the same way [`EnvelopeMultiplexer::default_message_handler`]
    /// does for its echo.
    pub fn on_command(
        mut self,
        predicate: impl Fn(&Command) -> bool + Send + Sync + 'static,
        handler: impl Fn(RequestCommand) + Send + Sync + 'static,
    ) -> Self {
        self.commands.routes.push(Route {
            predicate: Box::new(move |request: &RequestCommand| predicate(request.request())),
            handler: Box::new(handler),
        });
        self
    }

    pub fn default_command_handler(mut self, handler: impl Fn(RequestCommand) + Send + Sync + 'static) -> Self {
        self.commands.default = Some(Box::new(handler));
        self
    }

    pub fn on_session(
        mut self,
        predicate: impl Fn(&SessionEnvelope) -> bool + Send + Sync + 'static,
        handler: impl Fn(SessionEnvelope) + Send + Sync + 'static,
    ) -> Self {
        self.sessions.routes.push(Route { predicate: Box::new(predicate), handler: Box::new(handler) });
        self
    }

    /// Drives dispatch until the channel closes. Each kind is read
    /// concurrently so a slow message handler never delays command
    /// dispatch. Command *responses* (unsolicited or arriving after their
    /// [`Channel::process_command`] waiter already timed out) are logged
    /// and dropped rather than routed, since [`RequestCommand`]'s reply
    /// helpers only make sense for requests.
    pub async fn listen(self: Arc<Self>, channel: Arc<Channel>) {
        let messages = tokio::spawn({
            let mux = self.clone();
            let channel = channel.clone();
            async move {
                while let Some(message) = channel.receive_message().await {
                    mux.messages.dispatch(message);
                }
            }
        });
        let notifications = tokio::spawn({
            let mux = self.clone();
            let channel = channel.clone();
            async move {
                while let Some(notification) = channel.receive_notification().await {
                    mux.notifications.dispatch(notification);
                }
            }
        });
        let commands = tokio::spawn({
            let mux = self.clone();
            let channel = channel.clone();
            async move {
                while let Some(command) = channel.receive_command().await {
                    if command.is_request() {
                        mux.commands.dispatch(RequestCommand::new(command, channel.clone()));
                    } else {
                        tracing::debug!(
                            target: "lime::multiplexer",
                            id = %command.base.id,
                            "dropping unsolicited command response",
                        );
                    }
                }
            }
        });
        let sessions = tokio::spawn({
            let mux = self.clone();
            let channel = channel.clone();
            async move {
                while let Some(session) = channel.receive_session().await {
                    mux.sessions.dispatch(session);
                }
            }
        });
        let _ = tokio::join!(messages, notifications, commands, sessions);
    }
}

/// Sends a command and awaits its correlated response, wrapping the three
/// response shapes the multiplexer's handlers otherwise reconstruct by
/// hand.
pub async fn request_command(
    channel: &Channel,
    command: Command,
    timeout: Duration,
) -> Result<CommandResponse, ChannelError> {
    let response = channel.process_command(command, timeout).await?;
    Ok(match response.status {
        Some(crate::envelope::CommandStatus::Success) => match (response.type_.clone(), response.resource.clone()) {
            (Some(type_), Some(resource)) => CommandResponse::SuccessWithResource { type_, resource },
            _ => CommandResponse::Success,
        },
        Some(crate::envelope::CommandStatus::Failure) => CommandResponse::Failure(
            response
                .reason
                .clone()
                .unwrap_or_else(|| crate::reason::Reason::new(crate::reason::codes::GENERAL_ERROR, "unknown failure")),
        ),
        None => CommandResponse::Success,
    })
}

pub enum CommandResponse {
    Success,
    SuccessWithResource { type_: crate::media_type::MediaType, resource: serde_json::Value },
    Failure(crate::reason::Reason),
}
