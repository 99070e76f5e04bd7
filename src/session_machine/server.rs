use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{AuthenticationResult, Authenticator, Role};
use crate::envelope::{
    CompressionOption, Envelope, EncryptionOption, SessionEnvelope, SessionState,
};
use crate::error::HandshakeError;
use crate::identity::{Identity, Node};
use crate::reason::Reason;
use crate::transport::Transport;

use super::{HandshakeOutcome, DEFAULT_HANDSHAKE_TIMEOUT};

/// Assigns or rejects the node identity for a candidate that just
/// authenticated successfully. `instance` is whatever the candidate's
/// `from` carried during authentication, if anything.
pub type RegisterCallback =
    Arc<dyn Fn(&Identity, Role, Option<&str>) -> Result<Node, Reason> + Send + Sync>;

/// Assigns the candidate's own name/domain when present, falling back to
/// `anon@local`; keeps the candidate's offered instance, generating one if
/// absent. Matches the guest-session shape most deployments want out of
/// the box.
pub fn default_register(candidate: &Identity, _role: Role, instance: Option<&str>) -> Result<Node, Reason> {
    let name = if candidate.name.is_empty() { "anon".to_string() } else { candidate.name.clone() };
    let domain = if candidate.domain.is_empty() { "local".to_string() } else { candidate.domain.clone() };
    let instance = instance.map(|i| i.to_string()).unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok(Node { name, domain, instance: Some(instance) })
}

/// What the server offers, keyed by scheme so the driver can dispatch an
/// authentication round to the matching [`Authenticator`].
pub struct ServerHandshakeConfig {
    pub encryption_options: Vec<EncryptionOption>,
    pub compression_options: Vec<CompressionOption>,
    pub authenticators: HashMap<crate::envelope::AuthenticationScheme, Arc<dyn Authenticator>>,
    /// This server's own node, sent as `from` on the established envelope.
    pub server_node: Node,
    /// Invoked once authentication succeeds, to assign the session's node.
    pub register: RegisterCallback,
}

pub struct ServerHandshake {
    pub config: ServerHandshakeConfig,
}

impl ServerHandshake {
    pub fn new(config: ServerHandshakeConfig) -> Self {
        Self { config }
    }

    /// Runs the server side of the handshake, returning the session id, the
    /// granted role, and the local/remote node once established.
    pub async fn run(
        &self,
        transport: &mut Box<dyn Transport>,
        tls_capable: bool,
    ) -> Result<HandshakeOutcome, HandshakeError> {
        self.expect_state(transport, SessionState::New).await?;

        let session_id = Uuid::new_v4().to_string();
        let mut encryption_options = self.config.encryption_options.clone();
        if !tls_capable {
            encryption_options.retain(|o| *o != EncryptionOption::Tls);
        }

        let negotiating = SessionEnvelope::negotiating(
            session_id.clone(),
            encryption_options,
            self.config.compression_options.clone(),
        );
        transport
            .send(&Envelope::Session(negotiating))
            .await
            .map_err(|e| HandshakeError::Channel(e.into()))?;

        let chosen = self.expect_state(transport, SessionState::Negotiating).await?;
        let encryption = chosen.encryption.unwrap_or(EncryptionOption::None);
        if encryption == EncryptionOption::Tls {
            transport
                .set_encryption(EncryptionOption::Tls)
                .await
                .map_err(|e| HandshakeError::Channel(e.into()))?;
        }

        let schemes: Vec<_> = self.config.authenticators.keys().copied().collect();
        let authenticating = SessionEnvelope::authenticating(session_id.clone(), schemes);
        transport
            .send(&Envelope::Session(authenticating))
            .await
            .map_err(|e| HandshakeError::Channel(e.into()))?;

        loop {
            let round = self.expect_state(transport, SessionState::Authenticating).await?;
            let Some(scheme) = round.scheme else {
                return Err(HandshakeError::NoCommonOption("authentication scheme"));
            };
            let Some(authenticator) = self.config.authenticators.get(&scheme) else {
                return Err(HandshakeError::AuthenticationRejected(
                    scheme,
                    "scheme not offered".into(),
                ));
            };
            let candidate = round.base.from.clone().unwrap_or_default();
            let candidate_identity = candidate.identity();
            let payload = round.authentication.unwrap_or(serde_json::Value::Null);
            let AuthenticationResult { role, challenge } =
                authenticator.authenticate(&candidate_identity, &payload).await;

            match challenge {
                Some(challenge) => {
                    let mut next = SessionEnvelope::new(session_id.clone(), SessionState::Authenticating);
                    next.scheme = Some(scheme);
                    next.authentication = Some(challenge);
                    transport
                        .send(&Envelope::Session(next))
                        .await
                        .map_err(|e| HandshakeError::Channel(e.into()))?;
                    continue;
                }
                None if role == Role::Unknown => {
                    let reason = crate::reason::Reason::new(
                        crate::reason::codes::UNAUTHORIZED,
                        "authentication rejected",
                    );
                    let failed = SessionEnvelope::failed(session_id.clone(), reason.clone());
                    let _ = transport.send(&Envelope::Session(failed)).await;
                    return Err(HandshakeError::AuthenticationRejected(scheme, reason.to_string()));
                }
                None => {
                    let assigned = match (self.config.register)(&candidate_identity, role, candidate.instance.as_deref()) {
                        Ok(node) => node,
                        Err(reason) => {
                            let failed = SessionEnvelope::failed(session_id.clone(), reason.clone());
                            let _ = transport.send(&Envelope::Session(failed)).await;
                            return Err(HandshakeError::AuthenticationRejected(scheme, reason.to_string()));
                        }
                    };
                    let mut established = SessionEnvelope::new(session_id.clone(), SessionState::Established);
                    established.base.to = Some(assigned.clone());
                    established.base.from = Some(self.config.server_node.clone());
                    established.authentication = Some(serde_json::json!({ "role": role }));
                    transport
                        .send(&Envelope::Session(established))
                        .await
                        .map_err(|e| HandshakeError::Channel(e.into()))?;
                    return Ok(HandshakeOutcome {
                        session_id,
                        role,
                        local_node: self.config.server_node.clone(),
                        remote_node: assigned,
                    });
                }
            }
        }
    }

    async fn expect_state(
        &self,
        transport: &mut Box<dyn Transport>,
        expected: SessionState,
    ) -> Result<SessionEnvelope, HandshakeError> {
        let envelope = tokio::time::timeout(DEFAULT_HANDSHAKE_TIMEOUT, transport.receive())
            .await
            .map_err(|_| {
                HandshakeError::Failed(crate::reason::Reason::new(
                    crate::reason::codes::COMMAND_PROCESSING_TIMEOUT,
                    "handshake timed out",
                ))
            })?
            .map_err(|e| HandshakeError::Channel(e.into()))?
            .ok_or_else(|| HandshakeError::Channel(crate::error::ChannelError::Closed))?;

        match envelope {
            Envelope::Session(session) if session.state == expected => Ok(session),
            Envelope::Session(session) => Err(HandshakeError::UnexpectedState(session.state, expected)),
            other => Err(HandshakeError::NotASessionEnvelope(other.kind())),
        }
    }
}
