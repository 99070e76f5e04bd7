//! Media types: `type/subtype+suffix`, e.g. `application/vnd.lime.presence+json`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaTypeParseError {
    #[error("media type is missing a '/' separator: {0}")]
    MissingSeparator(String),
}

/// A MIME-ish media type. The suffix, when present, selects the interpreter
/// used to decode the sibling payload (`+json` routes through the document
/// registry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaType {
    pub type_: String,
    pub subtype: String,
    pub suffix: Option<String>,
}

impl MediaType {
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>, suffix: Option<String>) -> Self {
        Self {
            type_: type_.into(),
            subtype: subtype.into(),
            suffix,
        }
    }

    pub fn is_json(&self) -> bool {
        self.suffix.as_deref() == Some("json")
    }

    pub fn application_json() -> Self {
        Self::new("application", "json", Some("json".to_string()))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "+{suffix}")?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_, rest) = s
            .split_once('/')
            .ok_or_else(|| MediaTypeParseError::MissingSeparator(s.to_string()))?;
        let (subtype, suffix) = match rest.split_once('+') {
            Some((subtype, suffix)) => (subtype, Some(suffix.to_string())),
            None => (rest, None),
        };
        Ok(MediaType {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
            suffix,
        })
    }
}

impl TryFrom<String> for MediaType {
    type Error = MediaTypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MediaType> for String {
    fn from(media_type: MediaType) -> Self {
        media_type.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_suffix() {
        let mt = MediaType::new("application", "vnd.lime.presence", Some("json".into()));
        assert_eq!(mt.to_string(), "application/vnd.lime.presence+json");
        assert_eq!(mt.to_string().parse::<MediaType>().unwrap(), mt);
        assert!(mt.is_json());
    }

    #[test]
    fn round_trips_without_suffix() {
        let mt = MediaType::new("text", "plain", None);
        assert_eq!(mt.to_string(), "text/plain");
        assert_eq!(mt.to_string().parse::<MediaType>().unwrap(), mt);
        assert!(!mt.is_json());
    }

    #[test]
    fn rejects_missing_separator() {
        assert!("textplain".parse::<MediaType>().is_err());
    }
}
