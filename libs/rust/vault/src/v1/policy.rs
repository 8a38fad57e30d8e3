//! Policy management.

use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::error::{VaultError, VaultResult, not_found_on_404};
use crate::policy::Policy;
use crate::request::Transport;

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    policies: Option<Vec<String>>,
    #[serde(default)]
    keys: Option<Vec<String>>,
}

/// `/sys/policy`.
#[derive(Debug, Clone, Copy)]
pub struct PolicyEndpoint<'a> {
    transport: &'a Transport,
}

impl<'a> PolicyEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Names of all policies.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn items(&self) -> VaultResult<Vec<String>> {
        let listing: Listing = self.transport.get("/sys/policy").await?.json()?;
        Ok(listing.policies.or(listing.keys).unwrap_or_default())
    }

    /// Read a policy.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] when the policy does not exist or is not
    /// visible, otherwise transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn read(&self, name: &str) -> VaultResult<Policy> {
        let mut policy: Policy = self
            .transport
            .get(&format!("/sys/policy/{name}"))
            .await
            .map_err(not_found_on_404(format!("policy `{name}`")))?
            .decode()?;
        if policy.name.is_empty() {
            policy.name = name.to_string();
        }
        Ok(policy)
    }

    /// Create or replace a policy. Takes effect immediately for every
    /// associated identity.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, policy), fields(name = %policy.name, rules = policy.len()))]
    pub async fn write(&self, policy: &Policy) -> VaultResult<bool> {
        let body = json!({ "rules": policy.document() });
        let response = self
            .transport
            .put(&format!("/sys/policy/{}", policy.name), Some(body))
            .await?;
        info!("policy written");
        Ok(response.ok())
    }

    /// Read a policy (empty when absent), change it and write it back whole.
    ///
    /// # Errors
    ///
    /// Fails when the read or the write fails.
    pub async fn update<F>(&self, name: &str, change: F) -> VaultResult<Policy>
    where
        F: FnOnce(&mut Policy),
    {
        let mut policy = match self.read(name).await {
            Ok(policy) => policy,
            Err(VaultError::NotFound(_)) => Policy::new(name),
            Err(err) => return Err(err),
        };
        change(&mut policy);
        self.write(&policy).await?;
        Ok(policy)
    }

    /// Delete a policy. Deleting an absent policy succeeds.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> VaultResult<bool> {
        let response = self.transport.delete(&format!("/sys/policy/{name}")).await?;
        info!("policy deleted");
        Ok(response.ok())
    }
}
