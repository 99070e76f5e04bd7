use serde_json::Value;

use crate::auth::Role;
use crate::envelope::{
    AuthenticationScheme, CompressionOption, EncryptionOption, SessionEnvelope, SessionState,
};
use crate::error::HandshakeError;
use crate::identity::Node;
use crate::transport::Transport;

use super::{HandshakeOutcome, DEFAULT_HANDSHAKE_TIMEOUT};

/// What the client offers and how it authenticates, provided by the caller
/// up front so the handshake can run to completion without callbacks.
pub struct ClientHandshakeConfig {
    pub preferred_encryption: EncryptionOption,
    pub preferred_compression: CompressionOption,
    pub scheme: AuthenticationScheme,
    /// The node this client is authenticating as, carried in the
    /// authenticating round's `from`. Name and domain may be empty (the
    /// server then assigns them, e.g. a guest gets `anon@<domain>`); the
    /// instance identifies this particular connection.
    pub candidate: Node,
    /// Produces the next authentication round, given the previous
    /// challenge (`None` on the first round).
    pub authentication_round: Box<dyn Fn(Option<&Value>) -> Value + Send + Sync>,
}

pub struct ClientHandshake {
    pub config: ClientHandshakeConfig,
}

impl ClientHandshake {
    pub fn new(config: ClientHandshakeConfig) -> Self {
        Self { config }
    }

    /// Runs the handshake over `transport`, returning the negotiated
    /// session id, granted role, and the local/remote node assigned during
    /// authentication once the session reaches `established`.
    pub async fn run(
        &self,
        transport: &mut Box<dyn Transport>,
    ) -> Result<HandshakeOutcome, HandshakeError> {
        transport
            .send(&crate::envelope::Envelope::Session(SessionEnvelope::new(
                String::new(),
                SessionState::New,
            )))
            .await
            .map_err(|e| HandshakeError::Channel(e.into()))?;

        let negotiating = self.expect_state(transport, SessionState::Negotiating).await?;
        let session_id = negotiating.base.id.clone();

        let offered_encryption = negotiating.encryption_options.clone().unwrap_or_default();
        let encryption = if offered_encryption.contains(&self.config.preferred_encryption) {
            self.config.preferred_encryption
        } else {
            return Err(HandshakeError::NoCommonOption("encryption"));
        };
        let offered_compression = negotiating.compression_options.clone().unwrap_or_default();
        let compression = if offered_compression.contains(&self.config.preferred_compression) {
            self.config.preferred_compression
        } else {
            return Err(HandshakeError::NoCommonOption("compression"));
        };

        let mut chosen = SessionEnvelope::new(session_id.clone(), SessionState::Negotiating);
        chosen.encryption = Some(encryption);
        chosen.compression = Some(compression);
        transport
            .send(&crate::envelope::Envelope::Session(chosen))
            .await
            .map_err(|e| HandshakeError::Channel(e.into()))?;

        if encryption == EncryptionOption::Tls {
            transport
                .set_encryption(EncryptionOption::Tls)
                .await
                .map_err(|e| HandshakeError::Channel(e.into()))?;
        }

        let authenticating = self
            .expect_state(transport, SessionState::Authenticating)
            .await?;
        if !authenticating
            .scheme_options
            .clone()
            .unwrap_or_default()
            .contains(&self.config.scheme)
        {
            return Err(HandshakeError::NoCommonOption("authentication scheme"));
        }

        let mut challenge: Option<Value> = None;
        loop {
            let round = (self.config.authentication_round)(challenge.as_ref());
            let mut reply = SessionEnvelope::new(session_id.clone(), SessionState::Authenticating);
            reply.scheme = Some(self.config.scheme);
            reply.authentication = Some(round);
            reply.base.from = Some(self.config.candidate.clone());
            transport
                .send(&crate::envelope::Envelope::Session(reply))
                .await
                .map_err(|e| HandshakeError::Channel(e.into()))?;

            let response = self.receive_session(transport).await?;
            match response.state {
                SessionState::Established => {
                    let role = response
                        .authentication
                        .as_ref()
                        .and_then(|v| v.get("role"))
                        .and_then(|v| serde_json::from_value::<Role>(v.clone()).ok())
                        .unwrap_or(Role::Member);
                    let local_node = response.base.to.clone().unwrap_or_default();
                    let remote_node = response.base.from.clone().unwrap_or_default();
                    return Ok(HandshakeOutcome { session_id, role, local_node, remote_node });
                }
                SessionState::Authenticating => {
                    challenge = response.authentication;
                    continue;
                }
                SessionState::Failed => {
                    return Err(HandshakeError::Failed(
                        response.reason.unwrap_or_else(|| {
                            crate::reason::Reason::new(
                                crate::reason::codes::SESSION_ERROR,
                                "session failed",
                            )
                        }),
                    ));
                }
                other => return Err(HandshakeError::UnexpectedState(other, SessionState::Authenticating)),
            }
        }
    }

    async fn receive_session(
        &self,
        transport: &mut Box<dyn Transport>,
    ) -> Result<SessionEnvelope, HandshakeError> {
        let envelope = tokio::time::timeout(DEFAULT_HANDSHAKE_TIMEOUT, transport.receive())
            .await
            .map_err(|_| HandshakeError::Failed(crate::reason::Reason::new(
                crate::reason::codes::COMMAND_PROCESSING_TIMEOUT,
                "handshake timed out",
            )))?
            .map_err(|e| HandshakeError::Channel(e.into()))?
            .ok_or_else(|| HandshakeError::Channel(crate::error::ChannelError::Closed))?;

        match envelope {
            crate::envelope::Envelope::Session(session) => Ok(session),
            other => Err(HandshakeError::NotASessionEnvelope(other.kind())),
        }
    }

    async fn expect_state(
        &self,
        transport: &mut Box<dyn Transport>,
        expected: SessionState,
    ) -> Result<SessionEnvelope, HandshakeError> {
        let session = self.receive_session(transport).await?;
        if session.state != expected {
            return Err(HandshakeError::UnexpectedState(session.state, expected));
        }
        Ok(session)
    }
}
