//! Secret backends: mount lifecycle and data access.

mod backends;

pub use backends::{AwsBackend, ConsulBackend, SqlBackend, TransitBackend};

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{MountInfo, mount_table};
use crate::error::{HttpErrorKind, VaultError, VaultResult, mount_failure, not_found_on_404};
use crate::objects::{KeyList, SecretValue};
use crate::registry::{MountPoint, Registry};
use crate::request::Transport;

/// Secret backend types known out of the box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecretKind {
    /// Arbitrary key/value storage
    Generic,
    /// Versionless key/value storage
    Kv,
    /// Dynamic AWS credentials
    Aws,
    /// Dynamic Consul tokens
    Consul,
    /// Dynamic MySQL users
    MySql,
    /// Dynamic PostgreSQL roles
    PostgreSql,
    /// Encryption as a service
    Transit,
    /// Registered by the caller
    Other(String),
}

impl SecretKind {
    /// Type string used by the server.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Generic => "generic",
            Self::Kv => "kv",
            Self::Aws => "aws",
            Self::Consul => "consul",
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
            Self::Transit => "transit",
            Self::Other(kind) => kind,
        }
    }

    /// Whether the backend issues credentials through `creds/<role>`.
    #[must_use]
    pub const fn issues_credentials(&self) -> bool {
        matches!(self, Self::Aws | Self::Consul | Self::MySql | Self::PostgreSql)
    }
}

impl From<&str> for SecretKind {
    fn from(kind: &str) -> Self {
        match kind {
            "generic" => Self::Generic,
            "kv" => Self::Kv,
            "aws" => Self::Aws,
            "consul" => Self::Consul,
            "mysql" => Self::MySql,
            "postgresql" => Self::PostgreSql,
            "transit" => Self::Transit,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry of the default secret backend types.
#[must_use]
pub fn default_registry() -> Registry<SecretBackend> {
    let mut registry = Registry::new("secret");
    for kind in ["generic", "kv", "aws", "consul", "mysql", "postgresql", "transit"] {
        registry.register(kind, SecretBackend::new);
    }
    registry
}

/// Handle on one mounted (or to-be-mounted) secret backend.
#[derive(Debug, Clone)]
pub struct SecretBackend {
    mount: MountPoint,
    kind: SecretKind,
}

impl SecretBackend {
    /// Build a handle for a mount.
    #[must_use]
    pub fn new(mount: MountPoint) -> Self {
        let kind = SecretKind::from(mount.kind());
        Self { mount, kind }
    }

    /// Mount name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.mount.name()
    }

    /// Backend type.
    #[must_use]
    pub const fn kind(&self) -> &SecretKind {
        &self.kind
    }

    /// The underlying mount.
    #[must_use]
    pub const fn mount_point(&self) -> &MountPoint {
        &self.mount
    }

    fn transport(&self) -> &Transport {
        self.mount.transport()
    }

    pub(crate) fn path(&self, key: &str) -> String {
        let key = key.trim_matches('/');
        if key.is_empty() {
            format!("/{}", self.name())
        } else {
            format!("/{}/{key}", self.name())
        }
    }

    pub(crate) fn require(&self, expected: &[&str], operation: &'static str) -> VaultResult<()> {
        if expected.contains(&self.kind.as_str()) {
            Ok(())
        } else {
            Err(VaultError::Unsupported {
                kind: self.kind.to_string(),
                operation,
            })
        }
    }

    /// Mount this backend under its name.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects the mount.
    #[instrument(skip(self), fields(name = self.name(), kind = %self.kind))]
    pub async fn mount(&self, description: Option<&str>) -> VaultResult<()> {
        let body = json!({
            "type": self.kind.as_str(),
            "description": description,
        });
        self.transport()
            .post(&format!("/sys/mounts/{}", self.name()), Some(body))
            .await
            .map_err(mount_failure("mount", self.name()))?;
        info!("secret backend mounted");
        Ok(())
    }

    /// Unmount this backend.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects the unmount.
    #[instrument(skip(self), fields(name = self.name()))]
    pub async fn unmount(&self) -> VaultResult<()> {
        self.transport()
            .delete(&format!("/sys/mounts/{}", self.name()))
            .await
            .map_err(mount_failure("unmount", self.name()))?;
        info!("secret backend unmounted");
        Ok(())
    }

    /// Move this backend to `dest`; the handle follows it.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects the move.
    #[instrument(skip(self), fields(from = self.name()))]
    pub async fn remount(&mut self, dest: &str) -> VaultResult<()> {
        let dest = dest.trim_matches('/');
        let body = json!({ "from": self.name(), "to": dest });
        self.transport()
            .post("/sys/remount", Some(body))
            .await
            .map_err(mount_failure("remount", self.name()))?;
        info!(to = dest, "secret backend remounted");
        self.mount.rename(dest);
        Ok(())
    }

    /// Read a secret.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] when the key does not exist, otherwise
    /// transport, HTTP or decode errors.
    #[instrument(skip(self), fields(mount = self.name()))]
    pub async fn read(&self, key: &str) -> VaultResult<SecretValue> {
        Ok(self
            .transport()
            .get(&self.path(key))
            .await
            .map_err(not_found_on_404(format!("secret `{}`", self.path(key))))?
            .decode()?)
    }

    /// Write a secret. `data` must be a JSON object.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidConfig`] when `data` is not an object, otherwise
    /// transport or HTTP errors.
    #[instrument(skip(self, data), fields(mount = self.name()))]
    pub async fn write(&self, key: &str, data: Value) -> VaultResult<bool> {
        if !data.is_object() {
            return Err(VaultError::invalid_config("secret data must be a JSON object"));
        }
        Ok(self.transport().post(&self.path(key), Some(data)).await?.ok())
    }

    /// Delete a secret.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.name()))]
    pub async fn delete(&self, key: &str) -> VaultResult<bool> {
        Ok(self.transport().delete(&self.path(key)).await?.ok())
    }

    /// Keys under a prefix. An absent prefix lists as empty.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self), fields(mount = self.name()))]
    pub async fn list(&self, prefix: &str) -> VaultResult<Vec<String>> {
        match self.transport().list(&self.path(prefix)).await {
            Ok(response) => Ok(response.decode::<KeyList>()?.0),
            Err(err) if err.is_http(HttpErrorKind::InvalidPath) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Generate credentials for a role (aws, consul, mysql, postgresql).
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] on backends that do not issue
    /// credentials, [`VaultError::NotFound`] for an unknown role, otherwise
    /// transport, HTTP or decode errors.
    #[instrument(skip(self), fields(mount = self.name()))]
    pub async fn creds(&self, role: &str) -> VaultResult<SecretValue> {
        if !self.kind.issues_credentials() {
            return Err(VaultError::Unsupported {
                kind: self.kind.to_string(),
                operation: "creds",
            });
        }
        let path = self.path(&format!("creds/{role}"));
        Ok(self
            .transport()
            .get(&path)
            .await
            .map_err(not_found_on_404(format!("role `{role}`")))?
            .decode()?)
    }

    /// AWS-specific operations.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is an `aws` backend.
    pub fn aws(&self) -> VaultResult<AwsBackend<'_>> {
        self.require(&["aws"], "aws configuration")?;
        Ok(AwsBackend::new(self))
    }

    /// Consul-specific operations.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is a `consul` backend.
    pub fn consul(&self) -> VaultResult<ConsulBackend<'_>> {
        self.require(&["consul"], "consul configuration")?;
        Ok(ConsulBackend::new(self))
    }

    /// SQL-specific operations (mysql, postgresql).
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is a SQL backend.
    pub fn sql(&self) -> VaultResult<SqlBackend<'_>> {
        self.require(&["mysql", "postgresql"], "sql configuration")?;
        Ok(SqlBackend::new(self))
    }

    /// Transit-specific operations.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is a `transit` backend.
    pub fn transit(&self) -> VaultResult<TransitBackend<'_>> {
        self.require(&["transit"], "transit")?;
        Ok(TransitBackend::new(self))
    }
}

/// Mounted secret backends, by name. Handles are built on access.
pub struct SecretCollection<'a> {
    mounts: BTreeMap<String, MountInfo>,
    transport: &'a Arc<Transport>,
    registry: &'a Registry<SecretBackend>,
}

impl SecretCollection<'_> {
    /// Listing entry of a mount.
    #[must_use]
    pub fn info(&self, name: &str) -> Option<&MountInfo> {
        self.mounts.get(name.trim_matches('/'))
    }

    /// Handle on a mount, typed by what the server reported.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] when nothing is mounted there,
    /// [`VaultError::UnknownBackend`] when its type is not registered.
    pub fn get(&self, name: &str) -> VaultResult<SecretBackend> {
        let info = self
            .info(name)
            .ok_or_else(|| VaultError::not_found(format!("secret mount `{name}`")))?;
        self.registry
            .load(MountPoint::new(&info.name, &info.kind, Arc::clone(self.transport)))
    }

    /// Whether something is mounted under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.info(name).is_some()
    }

    /// Mount names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mounts.keys().map(String::as_str)
    }

    /// Listing entries.
    pub fn iter(&self) -> impl Iterator<Item = &MountInfo> {
        self.mounts.values()
    }

    /// Number of mounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Whether nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

impl fmt::Debug for SecretCollection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretCollection")
            .field(&self.mounts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `/sys/mounts` and `/sys/remount`.
#[derive(Debug, Clone, Copy)]
pub struct SecretEndpoint<'a> {
    transport: &'a Arc<Transport>,
    registry: &'a Registry<SecretBackend>,
}

impl<'a> SecretEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Arc<Transport>, registry: &'a Registry<SecretBackend>) -> Self {
        Self { transport, registry }
    }

    /// Mounted backends.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn items(&self) -> VaultResult<SecretCollection<'a>> {
        let body = self.transport.get("/sys/mounts").await?.value()?;
        Ok(SecretCollection {
            mounts: mount_table(body),
            transport: self.transport,
            registry: self.registry,
        })
    }

    /// Handle on a backend without asking the server. The type defaults to
    /// the name, as for the default mounts (`generic` at `generic/`).
    ///
    /// # Errors
    ///
    /// [`VaultError::UnknownBackend`] when the type is not registered.
    pub fn load(&self, name: &str, kind: Option<&str>) -> VaultResult<SecretBackend> {
        let name = name.trim_matches('/');
        let kind = kind.unwrap_or(name);
        self.registry
            .load(MountPoint::new(name, kind, Arc::clone(self.transport)))
    }

    /// Mount a backend. The type defaults to the name.
    ///
    /// # Errors
    ///
    /// [`VaultError::UnknownBackend`] for an unregistered type,
    /// [`VaultError::Mount`] when the server rejects the mount.
    pub async fn mount(
        &self,
        name: &str,
        kind: Option<&str>,
        description: Option<&str>,
    ) -> VaultResult<(bool, SecretBackend)> {
        let backend = self.load(name, kind)?;
        backend.mount(description).await?;
        Ok((true, backend))
    }

    /// Unmount a backend.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects the unmount.
    #[instrument(skip(self))]
    pub async fn unmount(&self, name: &str) -> VaultResult<bool> {
        let name = name.trim_matches('/');
        let response = self
            .transport
            .delete(&format!("/sys/mounts/{name}"))
            .await
            .map_err(mount_failure("unmount", name))?;
        info!("secret backend unmounted");
        Ok(response.ok())
    }

    /// Move a backend from `src` to `dest`.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects the move.
    #[instrument(skip(self))]
    pub async fn remount(&self, src: &str, dest: &str) -> VaultResult<bool> {
        let (src, dest) = (src.trim_matches('/'), dest.trim_matches('/'));
        let response = self
            .transport
            .post("/sys/remount", Some(json!({ "from": src, "to": dest })))
            .await
            .map_err(mount_failure("remount", src))?;
        info!("secret backend remounted");
        Ok(response.ok())
    }
}
