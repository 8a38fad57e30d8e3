//! Seal and unseal.
//!
//! Unsealing is a multi-call protocol: the server accumulates submitted key
//! shares and unseals once `threshold` of them have been accepted. Progress is
//! server-side state advanced by call order alone, so shares are submitted
//! one at a time and each submission waits for the previous response.
//!
//! ```text
//! Sealed(0) --share--> Sealed(1) --share--> ... --share--> Unsealed
//!     ^                                                       |
//!     +------------------------- seal() ----------------------+
//! ```

use serde_json::json;
use tracing::{debug, info, instrument};

use crate::error::VaultResult;
use crate::objects::{KeyShare, SealStatus};
use crate::request::Transport;

/// Where an unseal attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealState {
    /// Sealed, with `progress` shares accepted so far
    Sealed {
        /// Shares accepted in the current attempt
        progress: u32,
    },
    /// Unsealed; terminal for the attempt
    Unsealed,
}

impl SealState {
    /// Whether the attempt is finished.
    #[must_use]
    pub const fn is_unsealed(self) -> bool {
        matches!(self, Self::Unsealed)
    }
}

impl From<&SealStatus> for SealState {
    fn from(status: &SealStatus) -> Self {
        if status.sealed {
            Self::Sealed {
                progress: status.progress,
            }
        } else {
            Self::Unsealed
        }
    }
}

impl From<SealStatus> for SealState {
    fn from(status: SealStatus) -> Self {
        Self::from(&status)
    }
}

/// `/sys/seal*` and `/sys/unseal`.
#[derive(Debug, Clone, Copy)]
pub struct SealEndpoint<'a> {
    transport: &'a Transport,
}

impl<'a> SealEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Current seal status. Read-only, safe mid-unseal.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn status(&self) -> VaultResult<SealStatus> {
        Ok(self.transport.get("/sys/seal-status").await?.decode()?)
    }

    /// Seal the server. Sealing a sealed server is a successful no-op.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn seal(&self) -> VaultResult<bool> {
        let response = self.transport.put("/sys/seal", None).await?;
        info!("server sealed");
        Ok(response.ok())
    }

    /// Submit a single share.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors. A rejected share surfaces
    /// as the server's classified HTTP failure.
    #[instrument(skip_all)]
    pub async fn unseal_key(&self, share: impl Into<KeyShare>) -> VaultResult<SealStatus> {
        let share = share.into();
        let status: SealStatus = self
            .transport
            .put("/sys/unseal", Some(json!({ "key": share.expose() })))
            .await?
            .decode()?;
        debug!(
            sealed = status.sealed,
            progress = status.progress,
            threshold = status.threshold,
            "share submitted"
        );
        Ok(status)
    }

    /// Submit shares in order until the server unseals.
    ///
    /// Shares left over once the server reports `sealed == false` are not
    /// sent. Fewer shares than the threshold is not an error: the returned
    /// status is still sealed and reports the partial progress. With no
    /// shares at all this is a single status read.
    ///
    /// # Errors
    ///
    /// Stops at the first failed submission and returns its error.
    #[instrument(skip_all)]
    pub async fn unseal<I>(&self, keys: I) -> VaultResult<SealStatus>
    where
        I: IntoIterator,
        I::Item: Into<KeyShare>,
    {
        let mut last = None;
        for share in keys {
            let status = self.unseal_key(share).await?;
            last = Some(status);
            if !status.sealed {
                info!(threshold = status.threshold, "server unsealed");
                break;
            }
        }

        match last {
            Some(status) => Ok(status),
            None => self.status().await,
        }
    }

    /// Discard the progress of the current unseal attempt.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn reset_unseal(&self) -> VaultResult<SealStatus> {
        let status = self
            .transport
            .put("/sys/unseal", Some(json!({ "reset": true })))
            .await?
            .decode()?;
        info!("unseal progress reset");
        Ok(status)
    }

    /// Start a step-wise unseal from the server's current status.
    ///
    /// # Errors
    ///
    /// Fails when the status cannot be read.
    pub async fn begin_unseal(&self) -> VaultResult<UnsealSession<'a>> {
        let status = self.status().await?;
        Ok(UnsealSession {
            seal: *self,
            status,
            submitted: 0,
        })
    }
}

/// Step-wise unseal driver.
///
/// Holds the last observed [`SealStatus`] and the number of shares this
/// session sent. Once the server reports unsealed, further submissions are
/// not sent and return the terminal state.
#[derive(Debug)]
pub struct UnsealSession<'a> {
    seal: SealEndpoint<'a>,
    status: SealStatus,
    submitted: u32,
}

impl UnsealSession<'_> {
    /// Submit one share and record the new status.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors; the last observed status is
    /// kept.
    pub async fn submit(&mut self, share: impl Into<KeyShare>) -> VaultResult<SealState> {
        if self.is_complete() {
            debug!("already unsealed, share not sent");
            return Ok(SealState::Unsealed);
        }

        self.status = self.seal.unseal_key(share).await?;
        self.submitted += 1;
        Ok(self.state())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SealState {
        SealState::from(&self.status)
    }

    /// Last observed status.
    #[must_use]
    pub const fn status(&self) -> &SealStatus {
        &self.status
    }

    /// Shares sent by this session.
    #[must_use]
    pub const fn submitted(&self) -> u32 {
        self.submitted
    }

    /// Shares still needed.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.status.remaining()
    }

    /// Whether the server is unsealed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !self.status.sealed
    }
}
