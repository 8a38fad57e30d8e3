//! Lease renewal and revocation.

use serde_json::json;
use tracing::{info, instrument};

use crate::error::VaultResult;
use crate::objects::Lease;
use crate::request::Transport;

/// `/sys/renew`, `/sys/revoke` and `/sys/revoke-prefix`.
#[derive(Debug, Clone, Copy)]
pub struct LeaseEndpoint<'a> {
    transport: &'a Transport,
}

impl<'a> LeaseEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Ask for a lease to be extended by `increment` seconds. The increment
    /// is advisory.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn renew(&self, lease_id: &str, increment: Option<u64>) -> VaultResult<Lease> {
        let path = format!("/sys/renew/{lease_id}");
        let body = json!({ "increment": increment });
        Ok(self.transport.put(&path, Some(body)).await?.decode()?)
    }

    /// Revoke a lease immediately.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn revoke(&self, lease_id: &str) -> VaultResult<bool> {
        let response = self.transport.put(&format!("/sys/revoke/{lease_id}"), None).await?;
        info!("lease revoked");
        Ok(response.ok())
    }

    /// Revoke every lease under a prefix.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn revoke_prefix(&self, prefix: &str) -> VaultResult<bool> {
        let path = format!("/sys/revoke-prefix/{}", prefix.trim_matches('/'));
        let response = self.transport.put(&path, None).await?;
        info!("leases revoked");
        Ok(response.ok())
    }
}
