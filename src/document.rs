//! Polymorphic payloads (`content`/`resource`) keyed by [`MediaType`].
//!
//! Decoding happens in two passes: the envelope skeleton is decoded first
//! (giving us the sibling `type` field), then the payload is handed to
//! whatever constructor the registry has for that media type. Unknown types
//! fall back to [`RawDocument`], which preserves the original JSON value so
//! round-tripping never loses data.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::media_type::MediaType;

/// Anything with a self-described media type that can be carried as an
/// envelope's `content` or `resource`.
pub trait Document: fmt::Debug + Send + Sync {
    fn media_type(&self) -> MediaType;
    fn to_json(&self) -> Value;
    fn as_any(&self) -> &dyn Any;
}

/// Fallback document for media types with no registered constructor. Keeps
/// the original JSON value intact so re-encoding reproduces the input.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub media_type: MediaType,
    pub value: Value,
}

impl Document for RawDocument {
    fn media_type(&self) -> MediaType {
        self.media_type.clone()
    }

    fn to_json(&self) -> Value {
        self.value.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Constructor = Box<dyn Fn(&Value) -> Result<Box<dyn Document>, String> + Send + Sync>;

/// Process-wide map from media type string to document constructor.
#[derive(Default)]
pub struct DocumentRegistry {
    constructors: HashMap<String, Constructor>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for the given media type. A later call for the
    /// same media type replaces the earlier one.
    pub fn register<F>(&mut self, media_type: MediaType, constructor: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Document>, String> + Send + Sync + 'static,
    {
        self.constructors
            .insert(media_type.to_string(), Box::new(constructor));
    }

    /// Decodes `value` using the constructor registered for `media_type`, or
    /// a [`RawDocument`] if none is registered.
    pub fn decode(&self, media_type: &MediaType, value: &Value) -> Result<Box<dyn Document>, String> {
        match self.constructors.get(&media_type.to_string()) {
            Some(constructor) => constructor(value),
            None => Ok(Box::new(RawDocument {
                media_type: media_type.clone(),
                value: value.clone(),
            })),
        }
    }
}

static REGISTRY: Lazy<RwLock<DocumentRegistry>> = Lazy::new(|| RwLock::new(DocumentRegistry::new()));

/// Returns the process-wide document registry.
pub fn registry() -> &'static RwLock<DocumentRegistry> {
    &REGISTRY
}

/// Convenience: registers a constructor on the process-wide registry.
pub fn register<F>(media_type: MediaType, constructor: F)
where
    F: Fn(&Value) -> Result<Box<dyn Document>, String> + Send + Sync + 'static,
{
    registry().write().unwrap().register(media_type, constructor);
}

/// Convenience: decodes using the process-wide registry.
pub fn decode(media_type: &MediaType, value: &Value) -> Result<Box<dyn Document>, String> {
    registry().read().unwrap().decode(media_type, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Presence {
        status: String,
    }

    impl Document for Presence {
        fn media_type(&self) -> MediaType {
            MediaType::new("application", "vnd.lime.presence", Some("json".into()))
        }

        fn to_json(&self) -> Value {
            json!({ "status": self.status })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn unknown_media_type_decodes_to_raw_document() {
        let mut local = DocumentRegistry::new();
        local.register(MediaType::new("application", "vnd.lime.presence", Some("json".into())), |value| {
            let status = value
                .get("status")
                .and_then(Value::as_str)
                .ok_or("missing status")?
                .to_string();
            Ok(Box::new(Presence { status }))
        });

        let unknown_type = MediaType::new("application", "vnd.unknown", Some("json".into()));
        let value = json!({"foo": "bar"});
        let decoded = local.decode(&unknown_type, &value).unwrap();
        assert_eq!(decoded.to_json(), value);
        assert!(decoded.as_any().downcast_ref::<RawDocument>().is_some());
    }

    #[test]
    fn known_media_type_decodes_to_typed_document() {
        let mut local = DocumentRegistry::new();
        local.register(MediaType::new("application", "vnd.lime.presence", Some("json".into())), |value| {
            let status = value
                .get("status")
                .and_then(Value::as_str)
                .ok_or("missing status")?
                .to_string();
            Ok(Box::new(Presence { status }))
        });

        let presence_type = MediaType::new("application", "vnd.lime.presence", Some("json".into()));
        let value = json!({"status": "available"});
        let decoded = local.decode(&presence_type, &value).unwrap();
        let presence = decoded.as_any().downcast_ref::<Presence>().unwrap();
        assert_eq!(presence.status, "available");
    }
}
