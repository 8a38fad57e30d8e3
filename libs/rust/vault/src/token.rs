//! Credential identities.
//!
//! The server describes a token in two envelopes: lookups answer with the
//! token in `data` (`data.id`), while logins and token creation answer with
//! it in `auth` (`auth.client_token`). [`Token`] decodes either and exposes
//! the identity through [`Token::id`].

use serde_json::{Map, Value};
use std::fmt;

use crate::error::DecodeError;
use crate::objects::{Decode, from_shape};

#[derive(serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    auth: Option<Map<String, Value>>,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    lease_id: String,
    #[serde(default)]
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
}

/// Lease fields shared by both envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLease {
    /// Lease attached to the response
    pub lease_id: String,
    /// Lease length in seconds
    pub lease_duration: u64,
    /// Whether the lease can be renewed
    pub renewable: bool,
}

/// Token as described by a lookup.
#[derive(Clone, PartialEq)]
pub struct ReadToken {
    id: String,
    data: Map<String, Value>,
    lease: TokenLease,
}

/// Token as issued by a login, a creation or a renewal.
#[derive(Clone, PartialEq)]
pub struct LoginToken {
    id: String,
    auth: Map<String, Value>,
    lease: TokenLease,
}

/// A credential identity from either envelope.
#[derive(Clone, PartialEq)]
pub enum Token {
    /// From `data` (lookups)
    Read(ReadToken),
    /// From `auth` (logins, creation, renewal)
    Login(LoginToken),
}

fn required_id(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<String, DecodeError> {
    map.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DecodeError::MissingField {
            shape: Token::SHAPE,
            field,
        })
}

impl Token {
    /// The token identity.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Read(token) => &token.id,
            Self::Login(token) => &token.id,
        }
    }

    /// The fields describing the token (`data` or `auth`).
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        match self {
            Self::Read(token) => &token.data,
            Self::Login(token) => &token.auth,
        }
    }

    /// Look up a descriptive field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields().get(key)
    }

    /// Policies attached to the token.
    #[must_use]
    pub fn policies(&self) -> Vec<String> {
        self.get("policies")
            .and_then(Value::as_array)
            .map(|policies| {
                policies
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Metadata attached to the token (`meta` or `metadata`).
    #[must_use]
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.get("metadata")
            .or_else(|| self.get("meta"))
            .and_then(Value::as_object)
    }

    /// Lease fields of the envelope.
    #[must_use]
    pub const fn lease(&self) -> &TokenLease {
        match self {
            Self::Read(token) => &token.lease,
            Self::Login(token) => &token.lease,
        }
    }

    /// Whether this came from a login-style envelope.
    #[must_use]
    pub const fn is_login(&self) -> bool {
        matches!(self, Self::Login(_))
    }
}

impl Decode for Token {
    const SHAPE: &'static str = "token";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        let envelope: Envelope = from_shape(Self::SHAPE, value)?;
        let lease = TokenLease {
            lease_id: envelope.lease_id,
            lease_duration: envelope.lease_duration,
            renewable: envelope.renewable,
        };

        match (envelope.auth, envelope.data) {
            (Some(auth), _) => Ok(Self::Login(LoginToken {
                id: required_id(&auth, "client_token")?,
                auth,
                lease,
            })),
            (None, Some(data)) => Ok(Self::Read(ReadToken {
                id: required_id(&data, "id")?,
                data,
                lease,
            })),
            (None, None) => Err(DecodeError::MissingField {
                shape: Self::SHAPE,
                field: "auth",
            }),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_login() { "LoginToken" } else { "ReadToken" };
        f.debug_struct(kind)
            .field("id", &"[REDACTED]")
            .field("policies", &self.policies())
            .finish_non_exhaustive()
    }
}

impl From<&Token> for String {
    fn from(token: &Token) -> Self {
        token.id().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_shape() {
        let token = Token::decode(json!({
            "auth": null,
            "data": {
                "display_name": "token",
                "id": "95aeacef-5e5a-e436-96f7-4c9a9837f36a",
                "meta": null,
                "num_uses": 0,
                "path": "auth/token/create",
                "policies": ["root"]
            },
            "lease_duration": 0,
            "lease_id": "",
            "renewable": false
        }))
        .unwrap();

        assert!(!token.is_login());
        assert_eq!(token.id(), "95aeacef-5e5a-e436-96f7-4c9a9837f36a");
        assert_eq!(token.policies(), vec!["root"]);
        assert_eq!(token.get("display_name"), Some(&json!("token")));
    }

    #[test]
    fn test_login_shape() {
        let token = Token::decode(json!({
            "auth": {
                "client_token": "4f1b5a2c",
                "lease_duration": 3600,
                "metadata": {"username": "mitchellh"},
                "policies": ["default"],
                "renewable": true
            },
            "data": null,
            "lease_duration": 0,
            "lease_id": "",
            "renewable": false
        }))
        .unwrap();

        assert!(token.is_login());
        assert_eq!(token.id(), "4f1b5a2c");
        assert_eq!(
            token.metadata().and_then(|m| m.get("username")),
            Some(&json!("mitchellh"))
        );
    }

    #[test]
    fn test_auth_without_client_token() {
        let err = Token::decode(json!({"auth": {"policies": []}, "data": null})).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField { field: "client_token", .. }
        ));
    }

    #[test]
    fn test_neither_envelope() {
        assert!(Token::decode(json!({"auth": null, "data": null})).is_err());
    }

    #[test]
    fn test_debug_hides_id() {
        let token = Token::decode(json!({"auth": {"client_token": "s.top"}})).unwrap();
        assert!(!format!("{token:?}").contains("s.top"));
    }
}
