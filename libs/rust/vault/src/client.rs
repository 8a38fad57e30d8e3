//! The `Vault` façade: one Transport, endpoint groups and backend registries.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::objects::InitializationResult;
use crate::registry::{Constructor, MountPoint, Registry};
use crate::request::{RawResponse, Transport};
use crate::v1::{
    AuditEndpoint, AuthBackend, AuthEndpoint, LeaseEndpoint, PolicyEndpoint, RawEndpoint, SealEndpoint, SecretBackend,
    SecretEndpoint, SysEndpoint, auth, secret,
};

/// A backend handle tagged with its family.
#[derive(Debug, Clone)]
pub enum Backend {
    /// An auth backend
    Auth(AuthBackend),
    /// A secret backend
    Secret(SecretBackend),
}

impl Backend {
    /// Mount name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Auth(backend) => backend.name(),
            Self::Secret(backend) => backend.name(),
        }
    }

    /// The auth handle, if this is one.
    #[must_use]
    pub const fn as_auth(&self) -> Option<&AuthBackend> {
        match self {
            Self::Auth(backend) => Some(backend),
            Self::Secret(_) => None,
        }
    }

    /// The secret handle, if this is one.
    #[must_use]
    pub const fn as_secret(&self) -> Option<&SecretBackend> {
        match self {
            Self::Secret(backend) => Some(backend),
            Self::Auth(_) => None,
        }
    }
}

/// Client for one Vault server.
///
/// All endpoint groups share the client's Transport, and with it the
/// connection pool and the current credential.
#[derive(Debug, Clone)]
pub struct Vault {
    transport: Arc<Transport>,
    auth_backends: Registry<AuthBackend>,
    secret_backends: Registry<SecretBackend>,
}

impl Vault {
    /// Create a client from a configuration.
    ///
    /// # Errors
    ///
    /// Fails when the address is invalid or the HTTP client cannot be built.
    pub fn new(config: &VaultConfig) -> VaultResult<Self> {
        let transport = Transport::new(config)?;
        info!(addr = %transport.addr(), "vault client created");
        Ok(Self {
            transport: Arc::new(transport),
            auth_backends: auth::default_registry(),
            secret_backends: secret::default_registry(),
        })
    }

    /// Create a client for an address with default settings.
    ///
    /// # Errors
    ///
    /// Fails when the address is invalid.
    pub fn connect(addr: impl Into<String>) -> VaultResult<Self> {
        Self::new(&VaultConfig::new(addr))
    }

    /// Create a client from the `VAULT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails when the configured address or TLS material is invalid.
    pub fn from_env() -> VaultResult<Self> {
        Self::new(&VaultConfig::from_env())
    }

    /// The shared Transport.
    #[must_use]
    pub const fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Server address.
    #[must_use]
    pub fn addr(&self) -> &str {
        self.transport.addr()
    }

    /// The current credential.
    pub async fn token(&self) -> Option<SecretString> {
        self.transport.credential().await
    }

    /// Use a credential for every subsequent request.
    pub async fn set_token(&self, token: impl Into<String>) {
        self.transport.set_credential(token).await;
    }

    /// Send subsequent requests anonymously.
    pub async fn clear_token(&self) {
        self.transport.clear_credential().await;
    }

    /// Initialization, leader and health.
    #[must_use]
    pub fn sys(&self) -> SysEndpoint<'_> {
        SysEndpoint::new(&self.transport)
    }

    /// Seal and unseal.
    #[must_use]
    pub fn seal(&self) -> SealEndpoint<'_> {
        SealEndpoint::new(&self.transport)
    }

    /// Auth backends.
    #[must_use]
    pub fn auth(&self) -> AuthEndpoint<'_> {
        AuthEndpoint::new(&self.transport, &self.auth_backends)
    }

    /// Secret backends.
    #[must_use]
    pub fn secret(&self) -> SecretEndpoint<'_> {
        SecretEndpoint::new(&self.transport, &self.secret_backends)
    }

    /// Policies.
    #[must_use]
    pub fn policy(&self) -> PolicyEndpoint<'_> {
        PolicyEndpoint::new(&self.transport)
    }

    /// Audit devices.
    #[must_use]
    pub fn audit(&self) -> AuditEndpoint<'_> {
        AuditEndpoint::new(&self.transport)
    }

    /// Leases.
    #[must_use]
    pub fn lease(&self) -> LeaseEndpoint<'_> {
        LeaseEndpoint::new(&self.transport)
    }

    /// Raw storage.
    #[must_use]
    pub fn raw(&self) -> RawEndpoint<'_> {
        RawEndpoint::new(&self.transport)
    }

    /// Initialize the server and adopt the returned root credential.
    ///
    /// # Errors
    ///
    /// See [`SysEndpoint::initialize`].
    pub async fn initialize(&self, shares: u32, threshold: u32) -> VaultResult<InitializationResult> {
        let result = self.sys().initialize(shares, threshold).await?;
        self.set_token(result.root_token().expose_secret()).await;
        Ok(result)
    }

    /// `GET` an arbitrary path.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn read(&self, path: &str) -> VaultResult<RawResponse> {
        self.transport.get(path).await
    }

    /// `POST` to an arbitrary path.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, body))]
    pub async fn write(&self, path: &str, body: Option<Value>) -> VaultResult<RawResponse> {
        self.transport.post(path, body).await
    }

    /// `DELETE` an arbitrary path.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> VaultResult<RawResponse> {
        self.transport.delete(path).await
    }

    /// Register a constructor for an auth backend type.
    pub fn register_auth_backend(&mut self, kind: impl Into<String>, constructor: Constructor<AuthBackend>) {
        self.auth_backends.register(kind, constructor);
    }

    /// Register a constructor for a secret backend type.
    pub fn register_secret_backend(&mut self, kind: impl Into<String>, constructor: Constructor<SecretBackend>) {
        self.secret_backends.register(kind, constructor);
    }

    /// Handle on the backend of type `kind` mounted at `name`, looked up in
    /// the secret registry first, then in the auth registry.
    ///
    /// # Errors
    ///
    /// [`VaultError::UnknownBackend`] when neither registry knows the type.
    pub fn load_backend(&self, kind: &str, name: &str) -> VaultResult<Backend> {
        let mount = MountPoint::new(name, kind, Arc::clone(&self.transport));
        if self.secret_backends.contains(kind) {
            return self.secret_backends.load(mount).map(Backend::Secret);
        }
        if self.auth_backends.contains(kind) {
            return self.auth_backends.load(mount).map(Backend::Auth);
        }
        Err(VaultError::UnknownBackend {
            family: "secret or auth",
            kind: kind.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v1::{AuthKind, SecretKind};

    fn vault() -> Vault {
        Vault::connect("http://127.0.0.1:8200").unwrap()
    }

    #[test]
    fn test_load_backend_by_family() {
        let vault = vault();

        let secret = vault.load_backend("consul", "creds").unwrap();
        assert_eq!(secret.name(), "creds");
        assert_eq!(secret.as_secret().map(SecretBackend::kind), Some(&SecretKind::Consul));

        let auth = vault.load_backend("github", "github").unwrap();
        assert_eq!(auth.as_auth().map(AuthBackend::kind), Some(&AuthKind::GitHub));
        assert!(auth.as_secret().is_none());
    }

    #[test]
    fn test_load_unknown_backend() {
        assert!(matches!(
            vault().load_backend("kerberos", "krb"),
            Err(VaultError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_register_custom_backend() {
        let mut vault = vault();
        vault.register_secret_backend("pki", SecretBackend::new);

        let pki = vault.load_backend("pki", "pki").unwrap();
        assert_eq!(
            pki.as_secret().map(SecretBackend::kind),
            Some(&SecretKind::Other("pki".to_string()))
        );
    }

    #[test]
    fn test_token_rotation_is_shared() {
        let vault = vault();
        tokio_test::block_on(async {
            assert!(vault.token().await.is_none());
            vault.set_token("s.root").await;

            let seen = vault.transport().credential().await.unwrap();
            assert_eq!(seen.expose_secret(), "s.root");
        });
    }
}
