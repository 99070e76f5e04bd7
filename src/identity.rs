//! Identity and node addressing: `name@domain[/instance]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a textual identity or node cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("node has more than one instance separator: {0}")]
    MultipleInstanceSeparators(String),
}

/// A `name@domain` pair. Either half may be empty, which happens during
/// session bootstrap before a node has been fully assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    pub name: String,
    pub domain: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)
    }
}

impl FromStr for Identity {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((name, domain)) => Ok(Identity {
                name: name.to_string(),
                domain: domain.to_string(),
            }),
            None => Ok(Identity {
                name: s.to_string(),
                domain: String::new(),
            }),
        }
    }
}

impl TryFrom<String> for Identity {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_string()
    }
}

/// An `Identity` plus an optional `instance`, textual form `name@domain/instance`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Node {
    pub name: String,
    pub domain: String,
    pub instance: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            instance: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// A node is "complete" only when name, domain, and instance are all present.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.domain.is_empty() && self.instance.is_some()
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.name.clone(), self.domain.clone())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)?;
        if let Some(instance) = &self.instance {
            write!(f, "/{instance}")?;
        }
        Ok(())
    }
}

impl FromStr for Node {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, instance) = match s.split_once('/') {
            Some((address, rest)) => {
                if rest.contains('/') {
                    return Err(AddressParseError::MultipleInstanceSeparators(s.to_string()));
                }
                (address, Some(rest.to_string()))
            }
            None => (s, None),
        };
        let identity: Identity = address.parse()?;
        Ok(Node {
            name: identity.name,
            domain: identity.domain,
            instance,
        })
    }
}

impl TryFrom<String> for Node {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Node> for String {
    fn from(node: Node) -> Self {
        node.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let identity = Identity::new("alice", "example.com");
        let text = identity.to_string();
        assert_eq!(text, "alice@example.com");
        assert_eq!(text.parse::<Identity>().unwrap(), identity);
    }

    #[test]
    fn identity_round_trips_with_empty_halves() {
        for (name, domain) in [("", "example.com"), ("alice", ""), ("", "")] {
            let identity = Identity::new(name, domain);
            let text = identity.to_string();
            assert_eq!(text.parse::<Identity>().unwrap(), identity);
        }
    }

    #[test]
    fn node_round_trips_when_complete() {
        let node = Node::new("alice", "example.com").with_instance("phone");
        let text = node.to_string();
        assert_eq!(text, "alice@example.com/phone");
        assert_eq!(text.parse::<Node>().unwrap(), node);
        assert!(node.is_complete());
    }

    #[test]
    fn node_without_instance_is_not_complete() {
        let node = Node::new("alice", "example.com");
        assert!(!node.is_complete());
        assert_eq!(node.to_string().parse::<Node>().unwrap(), node);
    }

    #[test]
    fn node_rejects_multiple_instance_separators() {
        assert!("alice@example.com/a/b".parse::<Node>().is_err());
    }
}
