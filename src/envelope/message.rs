use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EnvelopeBase;
use crate::media_type::MediaType;

/// Fire-and-forget payload envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub base: EnvelopeBase,
    #[serde(rename = "type")]
    pub type_: MediaType,
    pub content: Value,
}

impl Message {
    pub fn new(type_: MediaType, content: Value) -> Self {
        Self {
            base: EnvelopeBase::new(),
            type_,
            content,
        }
    }

    /// Decodes `content` through the document registry using `type_`. This is
    /// the second pass of the two-pass decode described in the crate's design
    /// notes: the envelope skeleton (including the raw `content` value) is
    /// always decodable via `serde_json`, and callers that care about the
    /// typed payload call this explicitly.
    pub fn document(&self) -> Result<Box<dyn crate::document::Document>, String> {
        crate::document::decode(&self.type_, &self.content)
    }
}
