//! Typed result records decoded from response envelopes.
//!
//! Decoding is pure: a [`Decode`] implementation takes the parsed JSON body
//! and either produces the record or reports the missing or mistyped field.
//! Unknown extra fields are ignored so newer servers keep decoding.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::DecodeError;

/// A record that can be decoded from a response body.
pub trait Decode: Sized {
    /// Name of the shape, for error messages.
    const SHAPE: &'static str;

    /// Decode a parsed body.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when a required field is absent or mistyped.
    fn decode(value: Value) -> Result<Self, DecodeError>;
}

/// Deserialize `value` as `T`, reporting failures against `shape`.
pub(crate) fn from_shape<T: DeserializeOwned>(
    shape: &'static str,
    value: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Shape { shape, source })
}

/// Initialization status (`GET /sys/init`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Status {
    /// Whether the server has been initialized
    pub initialized: bool,
}

impl Decode for Status {
    const SHAPE: &'static str = "status";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        from_shape(Self::SHAPE, value)
    }
}

/// Seal status snapshot. Each unseal step returns a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SealStatus {
    /// Whether the server is sealed
    pub sealed: bool,
    /// Shares required to unseal
    #[serde(rename = "t")]
    pub threshold: u32,
    /// Shares the master key was split into
    #[serde(rename = "n")]
    pub shares: u32,
    /// Shares accepted so far in the current attempt
    pub progress: u32,
}

impl SealStatus {
    /// Shares still needed before the server unseals; zero once unsealed.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        if self.sealed {
            self.threshold.saturating_sub(self.progress)
        } else {
            0
        }
    }
}

impl Decode for SealStatus {
    const SHAPE: &'static str = "seal status";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        from_shape(Self::SHAPE, value)
    }
}

/// Health summary (`GET /sys/health`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Health {
    /// Whether the server has been initialized
    pub initialized: bool,
    /// Whether the server is sealed
    pub sealed: bool,
    /// Whether the node is a standby
    pub standby: bool,
}

impl Decode for Health {
    const SHAPE: &'static str = "health";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        from_shape(Self::SHAPE, value)
    }
}

/// High availability status (`GET /sys/leader`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HighAvailability {
    /// Whether HA mode is enabled
    #[serde(rename = "ha_enabled")]
    pub enabled: bool,
    /// Whether this node is the leader
    pub is_self: bool,
    /// Address of the current leader
    pub leader_address: String,
}

impl Decode for HighAvailability {
    const SHAPE: &'static str = "leader";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        from_shape(Self::SHAPE, value)
    }
}

/// One of the independently held shares of the master key.
#[derive(Clone)]
pub struct KeyShare(SecretString);

impl KeyShare {
    /// Wrap a share.
    #[must_use]
    pub fn new(share: impl Into<String>) -> Self {
        Self(SecretString::from(share.into()))
    }

    /// The share itself.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyShare([REDACTED])")
    }
}

impl PartialEq for KeyShare {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for KeyShare {}

impl From<String> for KeyShare {
    fn from(share: String) -> Self {
        Self::new(share)
    }
}

impl From<&str> for KeyShare {
    fn from(share: &str) -> Self {
        Self::new(share)
    }
}

impl From<&String> for KeyShare {
    fn from(share: &String) -> Self {
        Self::new(share.as_str())
    }
}

impl From<&Self> for KeyShare {
    fn from(share: &Self) -> Self {
        share.clone()
    }
}

/// Result of initializing a server. The only copy of the key shares: the
/// client does not keep them.
#[derive(Clone)]
pub struct InitializationResult {
    root_token: SecretString,
    keys: Vec<KeyShare>,
}

impl InitializationResult {
    /// The initial root credential.
    #[must_use]
    pub const fn root_token(&self) -> &SecretString {
        &self.root_token
    }

    /// The key shares.
    #[must_use]
    pub fn keys(&self) -> &[KeyShare] {
        &self.keys
    }

    /// Take ownership of the key shares.
    #[must_use]
    pub fn into_keys(self) -> Vec<KeyShare> {
        self.keys
    }
}

impl fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializationResult")
            .field("root_token", &"[REDACTED]")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl Decode for InitializationResult {
    const SHAPE: &'static str = "initialization";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        #[derive(Deserialize)]
        struct Raw {
            root_token: String,
            keys: Vec<String>,
        }

        let raw: Raw = from_shape(Self::SHAPE, value)?;
        Ok(Self {
            root_token: SecretString::from(raw.root_token),
            keys: raw.keys.into_iter().map(KeyShare::from).collect(),
        })
    }
}

/// Generic secret envelope with map-like access to `data`.
#[derive(Clone, PartialEq, Deserialize)]
pub struct SecretValue {
    /// Lease attached to the secret, empty when none
    pub lease_id: String,
    /// Lease length in seconds
    pub lease_duration: u64,
    /// Whether the lease can be renewed
    pub renewable: bool,
    /// Auth block, present when the call produced a credential
    #[serde(default)]
    pub auth: Option<Value>,
    /// The secret itself
    pub data: Map<String, Value>,
}

impl SecretValue {
    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    /// Remove a key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether `data` is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// The whole `data` map.
    #[must_use]
    pub const fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Take the `data` map.
    #[must_use]
    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("lease_id", &self.lease_id)
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl PartialEq<Map<String, Value>> for SecretValue {
    fn eq(&self, other: &Map<String, Value>) -> bool {
        &self.data == other
    }
}

impl PartialEq<Value> for SecretValue {
    fn eq(&self, other: &Value) -> bool {
        other.as_object().is_some_and(|map| &self.data == map)
    }
}

impl Decode for SecretValue {
    const SHAPE: &'static str = "secret";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        from_shape(Self::SHAPE, value)
    }
}

/// Lease metadata returned by a renewal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Lease {
    /// The lease
    pub lease_id: String,
    /// New lease length in seconds
    pub lease_duration: u64,
    /// Whether the lease can be renewed again
    pub renewable: bool,
}

impl Decode for Lease {
    const SHAPE: &'static str = "lease";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        from_shape(Self::SHAPE, value)
    }
}

/// Keys returned by a `LIST` call (`data.keys`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyList(pub Vec<String>);

impl Decode for KeyList {
    const SHAPE: &'static str = "key list";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        let keys = value
            .get("data")
            .and_then(|data| data.get("keys"))
            .cloned()
            .ok_or(DecodeError::MissingField {
                shape: Self::SHAPE,
                field: "data.keys",
            })?;
        from_shape(Self::SHAPE, keys).map(Self)
    }
}
