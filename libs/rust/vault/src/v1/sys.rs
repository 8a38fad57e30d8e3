//! Initialization, leadership and health.

use serde_json::json;
use tracing::{info, instrument};

use crate::error::VaultResult;
use crate::objects::{Health, HighAvailability, InitializationResult, Status};
use crate::request::Transport;

/// `/sys/init`, `/sys/leader` and `/sys/health`.
#[derive(Debug, Clone, Copy)]
pub struct SysEndpoint<'a> {
    transport: &'a Transport,
}

impl<'a> SysEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Whether the server has been initialized.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn status(&self) -> VaultResult<Status> {
        Ok(self.transport.get("/sys/init").await?.decode()?)
    }

    /// Initialize a new server, splitting the master key into `shares` of
    /// which `threshold` are needed to unseal.
    ///
    /// The keys are only ever returned here; the caller must persist them.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors. An already initialized
    /// server answers `InvalidRequest`.
    #[instrument(skip(self))]
    pub async fn initialize(&self, shares: u32, threshold: u32) -> VaultResult<InitializationResult> {
        let body = json!({
            "secret_shares": shares,
            "secret_threshold": threshold,
        });
        let result: InitializationResult = self.transport.put("/sys/init", Some(body)).await?.decode()?;
        info!(keys = result.keys().len(), threshold, "server initialized");
        Ok(result)
    }

    /// High availability status and current leader.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn leader(&self) -> VaultResult<HighAvailability> {
        Ok(self.transport.get("/sys/leader").await?.decode()?)
    }

    /// Health of the node.
    ///
    /// The server is asked to answer 200 for sealed, standby and
    /// uninitialized nodes so those states are reported, not raised.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn health(&self) -> VaultResult<Health> {
        let params = json!({
            "standbycode": 200,
            "sealedcode": 200,
            "uninitcode": 200,
        });
        Ok(self.transport.get_with("/sys/health", params).await?.decode()?)
    }
}
