//! Auth backends: enabling, disabling and logging in.

mod backends;
mod token;

pub use backends::{AppIdBackend, CertBackend, CertEntry, GitHubBackend, LdapBackend, LdapConfig, UserPassBackend};
pub use token::{TokenRequest, TokenStore};

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{MountInfo, mount_table};
use crate::error::{VaultError, VaultResult, login_failure, mount_failure};
use crate::registry::{MountPoint, Registry};
use crate::request::Transport;
use crate::token::Token;

/// Auth backend types known out of the box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthKind {
    /// The built-in token store
    Token,
    /// Username and password
    UserPass,
    /// LDAP bind
    Ldap,
    /// App id and user id pairs
    AppId,
    /// GitHub personal tokens
    GitHub,
    /// TLS client certificates
    Cert,
    /// Registered by the caller
    Other(String),
}

impl AuthKind {
    /// Type string used by the server.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Token => "token",
            Self::UserPass => "userpass",
            Self::Ldap => "ldap",
            Self::AppId => "app-id",
            Self::GitHub => "github",
            Self::Cert => "cert",
            Self::Other(kind) => kind,
        }
    }
}

impl From<&str> for AuthKind {
    fn from(kind: &str) -> Self {
        match kind {
            "token" => Self::Token,
            "userpass" => Self::UserPass,
            "ldap" => Self::Ldap,
            "app-id" => Self::AppId,
            "github" => Self::GitHub,
            "cert" => Self::Cert,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller presents to log in.
#[derive(Debug, Clone)]
pub enum LoginCredentials {
    /// `userpass` backends
    UserPass {
        /// Username
        username: String,
        /// Password
        password: SecretString,
    },
    /// `ldap` backends
    Ldap {
        /// LDAP username
        username: String,
        /// LDAP password
        password: SecretString,
    },
    /// `app-id` backends
    AppId {
        /// Application id
        app_id: String,
        /// User id
        user_id: SecretString,
    },
    /// `github` backends
    GitHub {
        /// Personal API token
        token: SecretString,
    },
    /// `cert` backends; the identity is the TLS client certificate
    Cert,
}

impl LoginCredentials {
    /// Username and password for a `userpass` backend.
    #[must_use]
    pub fn userpass(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserPass {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Username and password for an `ldap` backend.
    #[must_use]
    pub fn ldap(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Ldap {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// App id and user id for an `app-id` backend.
    #[must_use]
    pub fn app_id(app_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::AppId {
            app_id: app_id.into(),
            user_id: SecretString::from(user_id.into()),
        }
    }

    /// Personal token for a `github` backend.
    #[must_use]
    pub fn github(token: impl Into<String>) -> Self {
        Self::GitHub {
            token: SecretString::from(token.into()),
        }
    }

    /// The backend type these credentials are for.
    #[must_use]
    pub const fn kind(&self) -> AuthKind {
        match self {
            Self::UserPass { .. } => AuthKind::UserPass,
            Self::Ldap { .. } => AuthKind::Ldap,
            Self::AppId { .. } => AuthKind::AppId,
            Self::GitHub { .. } => AuthKind::GitHub,
            Self::Cert => AuthKind::Cert,
        }
    }

    /// Login path below the mount, and the request body.
    fn request(&self) -> (String, Option<Value>) {
        match self {
            Self::UserPass { username, password } | Self::Ldap { username, password } => (
                format!("login/{username}"),
                Some(json!({ "password": password.expose_secret() })),
            ),
            Self::AppId { app_id, user_id } => (
                "login".to_string(),
                Some(json!({ "app_id": app_id, "user_id": user_id.expose_secret() })),
            ),
            Self::GitHub { token } => (
                "login".to_string(),
                Some(json!({ "token": token.expose_secret() })),
            ),
            Self::Cert => ("login".to_string(), None),
        }
    }
}

/// Registry of the default auth backend types.
#[must_use]
pub fn default_registry() -> Registry<AuthBackend> {
    let mut registry = Registry::new("auth");
    for kind in ["token", "userpass", "ldap", "app-id", "github", "cert"] {
        registry.register(kind, AuthBackend::new);
    }
    registry
}

/// Handle on one auth mount.
#[derive(Debug, Clone)]
pub struct AuthBackend {
    mount: MountPoint,
    kind: AuthKind,
}

impl AuthBackend {
    /// Build a handle for a mount.
    #[must_use]
    pub fn new(mount: MountPoint) -> Self {
        let kind = AuthKind::from(mount.kind());
        Self { mount, kind }
    }

    /// Mount name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.mount.name()
    }

    /// Backend type.
    #[must_use]
    pub const fn kind(&self) -> &AuthKind {
        &self.kind
    }

    /// The underlying mount.
    #[must_use]
    pub const fn mount_point(&self) -> &MountPoint {
        &self.mount
    }

    pub(crate) fn path(&self, suffix: &str) -> String {
        format!("/auth/{}/{}", self.name(), suffix.trim_start_matches('/'))
    }

    pub(crate) fn require(&self, expected: &AuthKind, operation: &'static str) -> VaultResult<()> {
        if &self.kind == expected {
            Ok(())
        } else {
            Err(VaultError::Unsupported {
                kind: self.kind.to_string(),
                operation,
            })
        }
    }

    /// Enable this backend under its name.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects it.
    #[instrument(skip(self), fields(name = self.name(), kind = %self.kind))]
    pub async fn enable(&self, description: Option<&str>) -> VaultResult<bool> {
        let body = json!({
            "type": self.kind.as_str(),
            "description": description,
        });
        let response = self
            .mount
            .transport()
            .post(&format!("/sys/auth/{}", self.name()), Some(body))
            .await
            .map_err(mount_failure("enable", self.name()))?;
        info!("auth backend enabled");
        Ok(response.ok())
    }

    /// Disable this backend.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects it.
    #[instrument(skip(self), fields(name = self.name()))]
    pub async fn disable(&self) -> VaultResult<bool> {
        let response = self
            .mount
            .transport()
            .delete(&format!("/sys/auth/{}", self.name()))
            .await
            .map_err(mount_failure("disable", self.name()))?;
        info!("auth backend disabled");
        Ok(response.ok())
    }

    /// Log in and return the issued credential.
    ///
    /// The Transport keeps its current credential; adopt the returned one
    /// with [`Vault::set_token`](crate::Vault::set_token) if needed.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] when the credentials are for another
    /// backend type or the backend has no login, [`VaultError::Login`] when
    /// the server rejects them.
    #[instrument(skip(self, credentials), fields(name = self.name(), kind = %self.kind))]
    pub async fn login(&self, credentials: &LoginCredentials) -> VaultResult<Token> {
        let accepted = match &self.kind {
            AuthKind::Token => false,
            AuthKind::Other(_) => true,
            kind => *kind == credentials.kind(),
        };
        if !accepted {
            return Err(VaultError::Unsupported {
                kind: self.kind.to_string(),
                operation: "login",
            });
        }

        let (path, body) = credentials.request();
        let token: Token = self
            .mount
            .transport()
            .post(&self.path(&path), body)
            .await
            .map_err(login_failure(self.name()))?
            .decode()?;
        info!(policies = ?token.policies(), "logged in");
        Ok(token)
    }

    /// Token store operations.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is a `token` backend.
    pub fn token_store(&self) -> VaultResult<TokenStore<'_>> {
        self.require(&AuthKind::Token, "token store")?;
        Ok(TokenStore::new(self.mount.transport(), self.name()))
    }

    /// User management.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is a `userpass` backend.
    pub fn userpass(&self) -> VaultResult<UserPassBackend<'_>> {
        self.require(&AuthKind::UserPass, "user management")?;
        Ok(UserPassBackend::new(self))
    }

    /// LDAP configuration and groups.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is an `ldap` backend.
    pub fn ldap(&self) -> VaultResult<LdapBackend<'_>> {
        self.require(&AuthKind::Ldap, "ldap configuration")?;
        Ok(LdapBackend::new(self))
    }

    /// GitHub organization and team mapping.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is a `github` backend.
    pub fn github(&self) -> VaultResult<GitHubBackend<'_>> {
        self.require(&AuthKind::GitHub, "github configuration")?;
        Ok(GitHubBackend::new(self))
    }

    /// App and user id mapping.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is an `app-id` backend.
    pub fn app_id(&self) -> VaultResult<AppIdBackend<'_>> {
        self.require(&AuthKind::AppId, "app-id mapping")?;
        Ok(AppIdBackend::new(self))
    }

    /// Trusted certificates.
    ///
    /// # Errors
    ///
    /// [`VaultError::Unsupported`] unless this is a `cert` backend.
    pub fn cert(&self) -> VaultResult<CertBackend<'_>> {
        self.require(&AuthKind::Cert, "certificate management")?;
        Ok(CertBackend::new(self))
    }
}

/// Enabled auth backends, by name. Handles are built on access.
pub struct AuthCollection<'a> {
    mounts: BTreeMap<String, MountInfo>,
    transport: &'a Arc<Transport>,
    registry: &'a Registry<AuthBackend>,
}

impl AuthCollection<'_> {
    /// Listing entry of a backend.
    #[must_use]
    pub fn info(&self, name: &str) -> Option<&MountInfo> {
        self.mounts.get(name.trim_matches('/'))
    }

    /// Handle on a backend, typed by what the server reported.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] when nothing is enabled there,
    /// [`VaultError::UnknownBackend`] when its type is not registered.
    pub fn get(&self, name: &str) -> VaultResult<AuthBackend> {
        let info = self
            .info(name)
            .ok_or_else(|| VaultError::not_found(format!("auth backend `{name}`")))?;
        self.registry
            .load(MountPoint::new(&info.name, &info.kind, Arc::clone(self.transport)))
    }

    /// Whether a backend is enabled under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.info(name).is_some()
    }

    /// Backend names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mounts.keys().map(String::as_str)
    }

    /// Number of backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Whether nothing is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

impl fmt::Debug for AuthCollection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthCollection")
            .field(&self.mounts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `/sys/auth` and the auth mounts.
#[derive(Debug, Clone, Copy)]
pub struct AuthEndpoint<'a> {
    transport: &'a Arc<Transport>,
    registry: &'a Registry<AuthBackend>,
}

impl<'a> AuthEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Arc<Transport>, registry: &'a Registry<AuthBackend>) -> Self {
        Self { transport, registry }
    }

    /// Enabled backends.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn items(&self) -> VaultResult<AuthCollection<'a>> {
        let body = self.transport.get("/sys/auth").await?.value()?;
        Ok(AuthCollection {
            mounts: mount_table(body),
            transport: self.transport,
            registry: self.registry,
        })
    }

    /// Handle on a backend without asking the server. The type defaults to
    /// the name.
    ///
    /// # Errors
    ///
    /// [`VaultError::UnknownBackend`] when the type is not registered.
    pub fn load(&self, name: &str, kind: Option<&str>) -> VaultResult<AuthBackend> {
        let name = name.trim_matches('/');
        self.registry
            .load(MountPoint::new(name, kind.unwrap_or(name), Arc::clone(self.transport)))
    }

    /// Enable a backend and return its handle.
    ///
    /// # Errors
    ///
    /// [`VaultError::UnknownBackend`] for an unregistered type,
    /// [`VaultError::Mount`] when the server rejects it.
    pub async fn enable(&self, name: &str, kind: Option<&str>, description: Option<&str>) -> VaultResult<AuthBackend> {
        let backend = self.load(name, kind)?;
        backend.enable(description).await?;
        Ok(backend)
    }

    /// Disable the backend mounted at `name`.
    ///
    /// # Errors
    ///
    /// [`VaultError::Mount`] when the server rejects it.
    #[instrument(skip(self))]
    pub async fn disable(&self, name: &str) -> VaultResult<bool> {
        let name = name.trim_matches('/');
        let response = self
            .transport
            .delete(&format!("/sys/auth/{name}"))
            .await
            .map_err(mount_failure("disable", name))?;
        info!("auth backend disabled");
        Ok(response.ok())
    }

    /// Log in through the backend mounted at `name`.
    ///
    /// # Errors
    ///
    /// See [`AuthBackend::login`].
    pub async fn login(&self, name: &str, kind: Option<&str>, credentials: &LoginCredentials) -> VaultResult<Token> {
        self.load(name, kind)?.login(credentials).await
    }

    /// The token store mounted at `token/`.
    #[must_use]
    pub fn token(&self) -> TokenStore<'a> {
        TokenStore::new(self.transport, "token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;

    fn transport() -> Arc<Transport> {
        Arc::new(Transport::new(&VaultConfig::new("http://127.0.0.1:8200")).unwrap())
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in ["token", "userpass", "ldap", "app-id", "github", "cert"] {
            assert_eq!(AuthKind::from(kind).as_str(), kind);
        }
        assert_eq!(AuthKind::from("okta"), AuthKind::Other("okta".to_string()));
    }

    #[test]
    fn test_login_requests() {
        let (path, body) = LoginCredentials::userpass("mitchellh", "foo").request();
        assert_eq!(path, "login/mitchellh");
        assert_eq!(body, Some(json!({"password": "foo"})));

        let (path, body) = LoginCredentials::app_id("foo", "bar").request();
        assert_eq!(path, "login");
        assert_eq!(body, Some(json!({"app_id": "foo", "user_id": "bar"})));

        let (path, body) = LoginCredentials::Cert.request();
        assert_eq!(path, "login");
        assert!(body.is_none());
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = LoginCredentials::github("ghp_secret");
        assert!(!format!("{creds:?}").contains("ghp_secret"));
    }

    #[test]
    fn test_views_check_kind() {
        let transport = transport();
        let registry = default_registry();
        let endpoint = AuthEndpoint::new(&transport, &registry);

        let userpass = endpoint.load("users", Some("userpass")).unwrap();
        assert_eq!(userpass.path("login/bob"), "/auth/users/login/bob");
        assert!(userpass.userpass().is_ok());
        assert!(matches!(userpass.ldap(), Err(VaultError::Unsupported { .. })));

        let token = endpoint.load("token", None).unwrap();
        assert!(token.token_store().is_ok());
    }

    #[test]
    fn test_login_rejects_mismatched_credentials() {
        let transport = transport();
        let registry = default_registry();
        let endpoint = AuthEndpoint::new(&transport, &registry);

        let token = endpoint.load("token", None).unwrap();
        let err = tokio_test::block_on(token.login(&LoginCredentials::Cert)).unwrap_err();
        assert!(matches!(err, VaultError::Unsupported { operation: "login", .. }));

        let github = endpoint.load("github", None).unwrap();
        let err = tokio_test::block_on(github.login(&LoginCredentials::userpass("a", "b"))).unwrap_err();
        assert!(matches!(err, VaultError::Unsupported { .. }));
    }
}
