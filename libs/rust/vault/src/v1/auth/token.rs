//! The token store (`/auth/token`).

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::error::{VaultResult, not_found_on_404};
use crate::request::Transport;
use crate::token::Token;
use crate::util::{Ttl, format_duration};

/// Options for a new token. Unset options are left to the server.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    /// Explicit token id; root only
    pub id: Option<SecretString>,
    /// Policies, a subset of the caller's unless root
    pub policies: Option<Vec<String>>,
    /// Metadata passed through to audit devices
    pub metadata: Option<BTreeMap<String, String>>,
    /// Create an orphan token; root only
    pub no_parent: Option<bool>,
    /// Lease, e.g. `"1h"`
    pub lease: Option<Ttl>,
    /// Display name
    pub display_name: Option<String>,
    /// Maximum number of uses; `0` is unlimited
    pub num_uses: Option<u32>,
}

impl TokenRequest {
    /// A request with every option unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the token id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(SecretString::from(id.into()));
        self
    }

    /// Attach policies.
    #[must_use]
    pub fn with_policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies = Some(policies.into_iter().map(Into::into).collect());
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Create an orphan token.
    #[must_use]
    pub const fn orphan(mut self) -> Self {
        self.no_parent = Some(true);
        self
    }

    /// Set the lease.
    #[must_use]
    pub fn with_lease(mut self, lease: impl Into<Ttl>) -> Self {
        self.lease = Some(lease.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Limit the number of uses.
    #[must_use]
    pub const fn with_num_uses(mut self, uses: u32) -> Self {
        self.num_uses = Some(uses);
        self
    }

    /// Request body; unset options are `null` and stripped on the way out.
    #[must_use]
    pub fn to_body(&self) -> Value {
        json!({
            "id": self.id.as_ref().map(|id| id.expose_secret().to_string()),
            "policies": self.policies,
            "metadata": self.metadata,
            "no_parent": self.no_parent,
            "lease": self.lease.clone().map(format_duration),
            "display_name": self.display_name,
            "num_uses": self.num_uses,
        })
    }
}

/// Token store operations on one token mount.
#[derive(Debug, Clone)]
pub struct TokenStore<'a> {
    transport: &'a Transport,
    mount: String,
}

impl<'a> TokenStore<'a> {
    pub(crate) fn new(transport: &'a Transport, mount: impl Into<String>) -> Self {
        Self {
            transport,
            mount: mount.into(),
        }
    }

    fn path(&self, suffix: &str) -> String {
        format!("/auth/{}/{suffix}", self.mount)
    }

    /// Create a token.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip_all, fields(mount = %self.mount))]
    pub async fn create(&self, request: &TokenRequest) -> VaultResult<Token> {
        let token: Token = self
            .transport
            .post(&self.path("create"), Some(request.to_body()))
            .await?
            .decode()?;
        info!(policies = ?token.policies(), "token created");
        Ok(token)
    }

    /// Describe the credential making the call.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self), fields(mount = %self.mount))]
    pub async fn lookup_self(&self) -> VaultResult<Token> {
        Ok(self.transport.get(&self.path("lookup-self")).await?.decode()?)
    }

    /// Describe a token.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`](crate::VaultError::NotFound) when the token
    /// does not exist, otherwise transport, HTTP or decode errors.
    #[instrument(skip_all, fields(mount = %self.mount))]
    pub async fn lookup(&self, id: &str) -> VaultResult<Token> {
        Ok(self
            .transport
            .get(&self.path(&format!("lookup/{id}")))
            .await
            .map_err(not_found_on_404("token"))?
            .decode()?)
    }

    /// Revoke a token, its children and their secrets.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = %self.mount))]
    pub async fn revoke(&self, id: &str) -> VaultResult<bool> {
        let response = self.transport.post(&self.path(&format!("revoke/{id}")), None).await?;
        info!("token revoked");
        Ok(response.ok())
    }

    /// Revoke a token but orphan its children.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = %self.mount))]
    pub async fn revoke_orphan(&self, id: &str) -> VaultResult<bool> {
        let response = self
            .transport
            .post(&self.path(&format!("revoke-orphan/{id}")), None)
            .await?;
        info!("token revoked, children orphaned");
        Ok(response.ok())
    }

    /// Revoke every token issued under a path prefix.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = %self.mount))]
    pub async fn revoke_prefix(&self, prefix: &str) -> VaultResult<bool> {
        let path = self.path(&format!("revoke-prefix/{}", prefix.trim_matches('/')));
        let response = self.transport.post(&path, None).await?;
        info!("tokens revoked");
        Ok(response.ok())
    }

    /// Renew a token's lease. The increment is advisory.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self, id), fields(mount = %self.mount))]
    pub async fn renew(&self, id: &str, increment: Option<u64>) -> VaultResult<Token> {
        Ok(self
            .transport
            .post(&self.path(&format!("renew/{id}")), Some(json!({ "increment": increment })))
            .await?
            .decode()?)
    }
}
