//! Type-specific configuration of secret backends.
//!
//! Each view borrows a [`SecretBackend`] whose type was checked when the
//! view was taken, and adds the calls only that type offers.

use serde_json::{Value, json};
use tracing::instrument;

use super::SecretBackend;
use crate::error::{DecodeError, VaultError, VaultResult, not_found_on_404};
use crate::objects::SecretValue;
use crate::util::{Ttl, base64_decode, base64_encode, format_duration};

impl SecretBackend {
    async fn read_entry(&self, path: &str, what: &str) -> VaultResult<SecretValue> {
        Ok(self
            .mount_point()
            .transport()
            .get(&self.path(path))
            .await
            .map_err(not_found_on_404(what))?
            .decode()?)
    }

    async fn post_entry(&self, path: &str, body: Option<Value>) -> VaultResult<bool> {
        Ok(self
            .mount_point()
            .transport()
            .post(&self.path(path), body)
            .await?
            .ok())
    }

    async fn delete_entry(&self, path: &str) -> VaultResult<bool> {
        Ok(self
            .mount_point()
            .transport()
            .delete(&self.path(path))
            .await?
            .ok())
    }
}

/// `aws` backend configuration.
#[derive(Debug, Clone, Copy)]
pub struct AwsBackend<'a> {
    backend: &'a SecretBackend,
}

impl<'a> AwsBackend<'a> {
    pub(super) const fn new(backend: &'a SecretBackend) -> Self {
        Self { backend }
    }

    /// Set the root credentials used to create IAM users.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = self.backend.name()))]
    pub async fn config_root(&self, access_key: &str, secret_key: &str, region: Option<&str>) -> VaultResult<bool> {
        let body = json!({
            "access_key": access_key,
            "secret_key": secret_key,
            "region": region,
        });
        self.backend.post_entry("config/root", Some(body)).await
    }

    /// Set the default and maximum lease of issued credentials.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = self.backend.name()))]
    pub async fn config_lease(&self, lease: impl Into<Ttl>, lease_max: impl Into<Ttl>) -> VaultResult<bool> {
        let body = json!({
            "lease": format_duration(lease),
            "lease_max": format_duration(lease_max),
        });
        self.backend.post_entry("config/lease", Some(body)).await
    }

    /// Create or replace a role from an IAM policy document.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, policy), fields(mount = self.backend.name()))]
    pub async fn write_role(&self, name: &str, policy: &Value) -> VaultResult<bool> {
        let body = json!({ "policy": policy.to_string() });
        self.backend.post_entry(&format!("roles/{name}"), Some(body)).await
    }

    /// Read a role.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] for an unknown role.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn read_role(&self, name: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("roles/{name}"), &format!("role `{name}`"))
            .await
    }

    /// Delete a role.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_role(&self, name: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("roles/{name}")).await
    }
}

/// `consul` backend configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConsulBackend<'a> {
    backend: &'a SecretBackend,
}

impl<'a> ConsulBackend<'a> {
    pub(super) const fn new(backend: &'a SecretBackend) -> Self {
        Self { backend }
    }

    /// Point the backend at a Consul agent with a management token.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, token), fields(mount = self.backend.name()))]
    pub async fn config_access(&self, address: &str, token: &str, scheme: Option<&str>) -> VaultResult<bool> {
        let body = json!({
            "address": address,
            "token": token,
            "scheme": scheme,
        });
        self.backend.post_entry("config/access", Some(body)).await
    }

    /// Create or replace a role from a Consul ACL policy. The policy is sent
    /// base64-encoded.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, policy), fields(mount = self.backend.name()))]
    pub async fn write_role(&self, name: &str, policy: &str) -> VaultResult<bool> {
        let body = json!({ "policy": base64_encode(policy) });
        self.backend.post_entry(&format!("roles/{name}"), Some(body)).await
    }

    /// Read a role.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] for an unknown role.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn read_role(&self, name: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("roles/{name}"), &format!("role `{name}`"))
            .await
    }

    /// Delete a role.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_role(&self, name: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("roles/{name}")).await
    }
}

/// `mysql` and `postgresql` backend configuration.
#[derive(Debug, Clone, Copy)]
pub struct SqlBackend<'a> {
    backend: &'a SecretBackend,
}

impl<'a> SqlBackend<'a> {
    pub(super) const fn new(backend: &'a SecretBackend) -> Self {
        Self { backend }
    }

    /// Set the connection string of the database.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = self.backend.name()))]
    pub async fn config_connection(&self, dsn: &str) -> VaultResult<bool> {
        self.backend
            .post_entry("config/connection", Some(json!({ "value": dsn })))
            .await
    }

    /// Set the default and maximum lease of issued users.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = self.backend.name()))]
    pub async fn config_lease(&self, lease: impl Into<Ttl>, lease_max: impl Into<Ttl>) -> VaultResult<bool> {
        let body = json!({
            "lease": format_duration(lease),
            "lease_max": format_duration(lease_max),
        });
        self.backend.post_entry("config/lease", Some(body)).await
    }

    /// Create or replace a role from the SQL that creates its user.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, sql), fields(mount = self.backend.name()))]
    pub async fn write_role(&self, name: &str, sql: &str) -> VaultResult<bool> {
        self.backend
            .post_entry(&format!("roles/{name}"), Some(json!({ "sql": sql })))
            .await
    }

    /// Read a role.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] for an unknown role.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn read_role(&self, name: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("roles/{name}"), &format!("role `{name}`"))
            .await
    }

    /// Delete a role.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_role(&self, name: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("roles/{name}")).await
    }
}

/// `transit` backend: named keys, encryption and decryption.
#[derive(Debug, Clone, Copy)]
pub struct TransitBackend<'a> {
    backend: &'a SecretBackend,
}

impl<'a> TransitBackend<'a> {
    pub(super) const fn new(backend: &'a SecretBackend) -> Self {
        Self { backend }
    }

    /// Create a named key.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn write_key(&self, name: &str) -> VaultResult<bool> {
        self.backend.post_entry(&format!("keys/{name}"), None).await
    }

    /// Describe a named key.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] for an unknown key.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn read_key(&self, name: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("keys/{name}"), &format!("transit key `{name}`"))
            .await
    }

    /// Delete a named key.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_key(&self, name: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("keys/{name}")).await
    }

    /// Encrypt with a named key; returns the ciphertext.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self, plaintext), fields(mount = self.backend.name()))]
    pub async fn encrypt(&self, key: &str, plaintext: impl AsRef<[u8]>) -> VaultResult<String> {
        let body = json!({ "plaintext": base64_encode(plaintext) });
        let value: SecretValue = self
            .backend
            .mount_point()
            .transport()
            .post(&self.backend.path(&format!("encrypt/{key}")), Some(body))
            .await?
            .decode()?;
        string_field(&value, "ciphertext")
    }

    /// Decrypt with a named key; returns the plaintext bytes.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self, ciphertext), fields(mount = self.backend.name()))]
    pub async fn decrypt(&self, key: &str, ciphertext: &str) -> VaultResult<Vec<u8>> {
        let body = json!({ "ciphertext": ciphertext });
        let value: SecretValue = self
            .backend
            .mount_point()
            .transport()
            .post(&self.backend.path(&format!("decrypt/{key}")), Some(body))
            .await?
            .decode()?;
        base64_decode(&string_field(&value, "plaintext")?)
    }
}

fn string_field(value: &SecretValue, field: &'static str) -> VaultResult<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            VaultError::Decode(DecodeError::MissingField {
                shape: "transit",
                field,
            })
        })
}
