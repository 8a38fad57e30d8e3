//! Asynchronous client for the HashiCorp Vault HTTP API.
//!
//! [`Vault`] owns a single [`Transport`] and hands out endpoint groups
//! (`sys`, `seal`, `auth`, `secret`, `policy`, `audit`, `lease`, `raw`) that
//! borrow it. Responses are decoded into typed records; failures are
//! classified into [`VaultError`].
//!
//! ```no_run
//! # async fn run() -> vault_client::VaultResult<()> {
//! use vault_client::{Vault, VaultConfig};
//!
//! let vault = Vault::new(&VaultConfig::new("http://127.0.0.1:8200"))?;
//! let init = vault.initialize(5, 3).await?;
//! let status = vault.seal().unseal(init.keys()).await?;
//! assert!(!status.sealed);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod objects;
pub mod policy;
pub mod registry;
pub mod request;
pub mod token;
pub mod util;
pub mod v1;

pub use client::{Backend, Vault};
pub use config::{CredentialCarrier, VaultConfig};
pub use error::{DecodeError, HttpError, HttpErrorKind, LoginError, MountError, VaultError, VaultResult};
pub use objects::{Decode, Health, HighAvailability, InitializationResult, KeyShare, Lease, SealStatus, SecretValue, Status};
pub use policy::{Policy, Rule, Rules};
pub use registry::{MountPoint, Registry};
pub use request::{RawResponse, Transport};
pub use token::Token;
pub use util::{Ttl, format_duration, format_policies};
pub use vault_common::TlsConfig;
