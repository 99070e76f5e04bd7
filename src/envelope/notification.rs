use serde::{Deserialize, Serialize};

use super::EnvelopeBase;
use crate::reason::Reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationEvent {
    Accepted,
    Dispatched,
    Received,
    Consumed,
    Failed,
}

/// Acknowledges a prior message; shares the message's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(flatten)]
    pub base: EnvelopeBase,
    pub event: NotificationEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl Notification {
    pub fn new(id: impl Into<String>, event: NotificationEvent) -> Self {
        Self {
            base: EnvelopeBase::with_id(id),
            event,
            reason: None,
        }
    }

    pub fn failed(id: impl Into<String>, reason: Reason) -> Self {
        Self {
            base: EnvelopeBase::with_id(id),
            event: NotificationEvent::Failed,
            reason: Some(reason),
        }
    }
}
