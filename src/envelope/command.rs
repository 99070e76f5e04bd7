use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EnvelopeBase;
use crate::media_type::MediaType;
use crate::reason::Reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandMethod {
    Get,
    Set,
    Delete,
    Subscribe,
    Unsubscribe,
    Observe,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Success,
    Failure,
}

/// A request (empty `status`) or response (non-empty `status`, sharing the
/// request's id) in the request/response correlation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(flatten)]
    pub base: EnvelopeBase,
    pub method: CommandMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CommandStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl Command {
    /// A bare request with the given method and id.
    pub fn request(id: impl Into<String>, method: CommandMethod) -> Self {
        Self {
            base: EnvelopeBase::with_id(id),
            method,
            uri: None,
            type_: None,
            resource: None,
            status: None,
            reason: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_resource(mut self, type_: MediaType, resource: Value) -> Self {
        self.type_ = Some(type_);
        self.resource = Some(resource);
        self
    }

    pub fn is_request(&self) -> bool {
        self.status.is_none()
    }

    pub fn is_response(&self) -> bool {
        self.status.is_some()
    }

    /// Builds a success response sharing this request's id.
    pub fn success_response(&self) -> Command {
        Command {
            base: EnvelopeBase::with_id(self.base.id.clone()),
            method: self.method,
            uri: None,
            type_: None,
            resource: None,
            status: Some(CommandStatus::Success),
            reason: None,
        }
    }

    /// Builds a success response carrying a resource, sharing this request's id.
    pub fn success_response_with_resource(&self, type_: MediaType, resource: Value) -> Command {
        let mut response = self.success_response();
        response.type_ = Some(type_);
        response.resource = Some(resource);
        response
    }

    /// Builds a failure response sharing this request's id.
    pub fn failure_response(&self, reason: Reason) -> Command {
        Command {
            base: EnvelopeBase::with_id(self.base.id.clone()),
            method: self.method,
            uri: None,
            type_: None,
            resource: None,
            status: Some(CommandStatus::Failure),
            reason: Some(reason),
        }
    }
}
