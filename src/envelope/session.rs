use serde::{Deserialize, Serialize};

use super::EnvelopeBase;
use crate::reason::Reason;

/// The handshake's coarse phase, driven by [`crate::session_machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    New,
    Negotiating,
    Authenticating,
    Established,
    Finishing,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionOption {
    None,
    Tls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionOption {
    None,
    Gzip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationScheme {
    Guest,
    Plain,
    Transport,
    Key,
    External,
}

/// Negotiates transport options and authentication scheme, then carries the
/// authentication round-trip itself. Every field past `state` is optional:
/// the server populates the option lists, the client echoes back a choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnvelope {
    #[serde(flatten)]
    pub base: EnvelopeBase,
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionOption>,
    #[serde(
        rename = "encryptionOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub encryption_options: Option<Vec<EncryptionOption>>,
    #[serde(
        rename = "compressionOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub compression_options: Option<Vec<CompressionOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<AuthenticationScheme>,
    #[serde(
        rename = "schemeOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scheme_options: Option<Vec<AuthenticationScheme>>,
    /// Opaque authentication round-trip payload; shape depends on `scheme`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl SessionEnvelope {
    pub fn new(id: impl Into<String>, state: SessionState) -> Self {
        Self {
            base: EnvelopeBase::with_id(id),
            state,
            encryption: None,
            compression: None,
            encryption_options: None,
            compression_options: None,
            scheme: None,
            scheme_options: None,
            authentication: None,
            reason: None,
        }
    }

    pub fn negotiating(
        id: impl Into<String>,
        encryption_options: Vec<EncryptionOption>,
        compression_options: Vec<CompressionOption>,
    ) -> Self {
        let mut session = Self::new(id, SessionState::Negotiating);
        session.encryption_options = Some(encryption_options);
        session.compression_options = Some(compression_options);
        session
    }

    pub fn authenticating(id: impl Into<String>, scheme_options: Vec<AuthenticationScheme>) -> Self {
        let mut session = Self::new(id, SessionState::Authenticating);
        session.scheme_options = Some(scheme_options);
        session
    }

    pub fn failed(id: impl Into<String>, reason: Reason) -> Self {
        let mut session = Self::new(id, SessionState::Failed);
        session.reason = Some(reason);
        session
    }
}
