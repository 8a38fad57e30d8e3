//! Raw storage access, below the mount system.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{VaultResult, not_found_on_404};
use crate::request::Transport;

#[derive(Deserialize)]
struct Entry {
    value: String,
}

/// `/sys/raw/{key}`. Requires a root credential.
#[derive(Debug, Clone, Copy)]
pub struct RawEndpoint<'a> {
    transport: &'a Transport,
}

impl<'a> RawEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    fn path(key: &str) -> String {
        format!("/sys/raw/{}", key.trim_start_matches('/'))
    }

    /// Read a storage key. Stored JSON text is decoded; anything else comes
    /// back as a JSON string.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`](crate::VaultError::NotFound) when the key is
    /// absent, otherwise transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn read(&self, key: &str) -> VaultResult<Value> {
        let entry: Entry = self
            .transport
            .get(&Self::path(key))
            .await
            .map_err(not_found_on_404(format!("raw key `{key}`")))?
            .json()?;
        Ok(serde_json::from_str(&entry.value).unwrap_or(Value::String(entry.value)))
    }

    /// Write a storage key as JSON text, so [`read`](Self::read) returns the
    /// same value.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, value))]
    pub async fn write(&self, key: &str, value: &Value) -> VaultResult<bool> {
        let response = self
            .transport
            .put(&Self::path(key), Some(json!({ "value": value.to_string() })))
            .await?;
        Ok(response.ok())
    }

    /// Delete a storage key.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> VaultResult<bool> {
        Ok(self.transport.delete(&Self::path(key)).await?.ok())
    }
}
