//! Authentication schemes exchanged during the `authenticating` session
//! state. Each scheme is an opaque round-trip over the session envelope's
//! `authentication` field; the session driver only needs to know how to
//! produce a client round and judge a server round against the candidate
//! identity carried in that round's `from`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::AuthenticationScheme;
use crate::identity::Identity;

/// The privilege level granted to an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Unknown,
    Member,
    Authority,
    RootAuthority,
}

impl Default for Role {
    fn default() -> Self {
        Role::Unknown
    }
}

pub struct AuthenticationResult {
    pub role: Role,
    /// Present when the server wants another authentication round before
    /// granting `role`.
    pub challenge: Option<Value>,
}

impl AuthenticationResult {
    pub fn granted(role: Role) -> Self {
        Self { role, challenge: None }
    }

    pub fn challenge(value: Value) -> Self {
        Self { role: Role::Unknown, challenge: Some(value) }
    }
}

/// The server side of one authentication scheme. `identity` is the
/// candidate node's identity as carried in the round's envelope `from`;
/// most schemes need it to look up a credential or assign a role.
#[async_trait]
pub trait Authenticator: Send + Sync {
    fn scheme(&self) -> AuthenticationScheme;

    async fn authenticate(&self, identity: &Identity, round: &Value) -> AuthenticationResult;
}

/// Accepts any identity unconditionally. The only scheme the session
/// driver accepts without an explicit `Authenticator` registration.
#[derive(Debug, Default)]
pub struct GuestAuthenticator;

#[async_trait]
impl Authenticator for GuestAuthenticator {
    fn scheme(&self) -> AuthenticationScheme {
        AuthenticationScheme::Guest
    }

    async fn authenticate(&self, _identity: &Identity, _round: &Value) -> AuthenticationResult {
        AuthenticationResult::granted(Role::Member)
    }
}

#[derive(Debug, Deserialize)]
struct PlainRound {
    /// Base64-encoded plaintext password. The candidate identity travels
    /// in the session envelope's `from`, not in this payload.
    password: String,
}

/// Checks a base64-encoded password against a caller-supplied comparator,
/// keyed by the candidate identity's name. This crate has no opinion on
/// password hashing; the comparator is where a hash scheme is plugged in.
/// Suitable once the session has negotiated `EncryptionOption::Tls`, since
/// the password otherwise crosses the wire merely base64-encoded, not
/// encrypted.
pub struct PlainAuthenticator {
    comparator: Box<dyn Fn(&str, &str) -> bool + Send + Sync>,
}

impl PlainAuthenticator {
    /// `comparator(identity_name, candidate_password)` returns whether the
    /// decoded password is correct for that identity.
    pub fn new(comparator: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        Self { comparator: Box::new(comparator) }
    }
}

#[async_trait]
impl Authenticator for PlainAuthenticator {
    fn scheme(&self) -> AuthenticationScheme {
        AuthenticationScheme::Plain
    }

    async fn authenticate(&self, identity: &Identity, round: &Value) -> AuthenticationResult {
        let Ok(round) = serde_json::from_value::<PlainRound>(round.clone()) else {
            return AuthenticationResult { role: Role::Unknown, challenge: None };
        };
        let Ok(decoded) = STANDARD.decode(round.password.as_bytes()) else {
            return AuthenticationResult { role: Role::Unknown, challenge: None };
        };
        let Ok(password) = String::from_utf8(decoded) else {
            return AuthenticationResult { role: Role::Unknown, challenge: None };
        };
        if (self.comparator)(&identity.name, &password) {
            AuthenticationResult::granted(Role::Member)
        } else {
            AuthenticationResult { role: Role::Unknown, challenge: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_authenticator_decodes_base64_password() {
        let authenticator = PlainAuthenticator::new(|name, password| name == "alice" && password == "correct-horse");
        let identity = Identity::new("alice", "example.com");
        let payload = serde_json::json!({ "password": STANDARD.encode("correct-horse") });
        let result = authenticator.authenticate(&identity, &payload).await;
        assert_eq!(result.role, Role::Member);
    }

    #[tokio::test]
    async fn plain_authenticator_rejects_wrong_password() {
        let authenticator = PlainAuthenticator::new(|name, password| name == "alice" && password == "correct-horse");
        let identity = Identity::new("alice", "example.com");
        let payload = serde_json::json!({ "password": STANDARD.encode("wrong") });
        let result = authenticator.authenticate(&identity, &payload).await;
        assert_eq!(result.role, Role::Unknown);
    }
}
