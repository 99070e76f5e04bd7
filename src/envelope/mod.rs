//! The four envelope kinds exchanged over a [`crate::channel::Channel`].

mod command;
mod message;
mod notification;
mod session;

pub use command::{Command, CommandMethod, CommandStatus};
pub use message::Message;
pub use notification::{Notification, NotificationEvent};
pub use session::{
    AuthenticationScheme, EncryptionOption, CompressionOption, SessionEnvelope, SessionState,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Node;
use std::collections::BTreeMap;

/// Fields common to every envelope kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeBase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Node>,
    /// Impersonation: the node actually sending on behalf of `from`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl EnvelopeBase {
    /// A fresh envelope base with a random opaque id and no addressing set.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: None,
            to: None,
            pp: None,
            metadata: None,
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new()
        }
    }
}

/// One of the four envelope kinds, discriminated by which sibling field the
/// wire object carries (`method` ⇒ Command, `event` ⇒ Notification, `state`
/// ⇒ Session, `type`+`content` ⇒ Message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Message(Message),
    Notification(Notification),
    Command(Command),
    Session(SessionEnvelope),
}

impl Envelope {
    pub fn base(&self) -> &EnvelopeBase {
        match self {
            Envelope::Message(m) => &m.base,
            Envelope::Notification(n) => &n.base,
            Envelope::Command(c) => &c.base,
            Envelope::Session(s) => &s.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EnvelopeBase {
        match self {
            Envelope::Message(m) => &mut m.base,
            Envelope::Notification(n) => &mut n.base,
            Envelope::Command(c) => &mut c.base,
            Envelope::Session(s) => &mut s.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Message(_) => EnvelopeKind::Message,
            Envelope::Notification(_) => EnvelopeKind::Notification,
            Envelope::Command(_) => EnvelopeKind::Command,
            Envelope::Session(_) => EnvelopeKind::Session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Message,
    Notification,
    Command,
    Session,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_base_generates_unique_ids() {
        let a = EnvelopeBase::new();
        let b = EnvelopeBase::new();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn envelope_dispatches_on_kind() {
        let envelope = Envelope::Notification(Notification {
            base: EnvelopeBase::new(),
            event: NotificationEvent::Received,
            reason: None,
        });
        assert_eq!(envelope.kind(), EnvelopeKind::Notification);
    }
}
