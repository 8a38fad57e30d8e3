//! Vault client configuration.

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use vault_common::{HttpConfig, TlsConfig};

use crate::error::{VaultError, VaultResult};

/// Default server address when `VAULT_ADDR` is unset.
pub const DEFAULT_ADDR: &str = "http://127.0.0.1:8200";

/// API version prefix.
pub const DEFAULT_VERSION: &str = "v1";

/// How the bearer credential travels with each request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialCarrier {
    /// `Cookie: token=<id>`
    Cookie,
    /// `X-Vault-Token: <id>`
    Header,
    /// Both, for servers of either generation
    #[default]
    Both,
}

impl CredentialCarrier {
    /// Whether the cookie is sent.
    #[must_use]
    pub const fn uses_cookie(self) -> bool {
        matches!(self, Self::Cookie | Self::Both)
    }

    /// Whether the header is sent.
    #[must_use]
    pub const fn uses_header(self) -> bool {
        matches!(self, Self::Header | Self::Both)
    }
}

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub addr: String,
    /// API version prefix
    pub version: String,
    /// Initial credential
    pub token: Option<SecretString>,
    /// How the credential is attached
    pub credential_carrier: CredentialCarrier,
    /// HTTP client settings, TLS included
    pub http: HttpConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl VaultConfig {
    /// Create a configuration for an address, without reading the environment.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            version: DEFAULT_VERSION.to_string(),
            token: None,
            credential_carrier: CredentialCarrier::default(),
            http: HttpConfig::default(),
        }
    }

    /// Build a configuration from the `VAULT_*` environment variables.
    ///
    /// Reads `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_CACERT`, `VAULT_CAPATH`,
    /// `VAULT_CLIENT_CERT`, `VAULT_CLIENT_KEY`, `VAULT_SKIP_VERIFY` and
    /// `VAULT_CLIENT_TIMEOUT` (seconds).
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut config = Self::new(var("VAULT_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()));
        config.token = var("VAULT_TOKEN").map(SecretString::from);

        let mut tls = TlsConfig::default();
        if let Some(ca) = var("VAULT_CACERT") {
            tls = tls.with_ca_cert(ca);
        }
        if let Some(dir) = var("VAULT_CAPATH") {
            tls = tls.with_ca_path(dir);
        }
        tls.client_cert = var("VAULT_CLIENT_CERT").map(PathBuf::from);
        tls.client_key = var("VAULT_CLIENT_KEY").map(PathBuf::from);
        if var("VAULT_SKIP_VERIFY").is_some_and(|v| is_truthy(&v)) {
            tls.verify_peer = false;
        }
        config.http.tls = tls;

        if let Some(secs) = var("VAULT_CLIENT_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            config.http.timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Set the initial credential.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the API version prefix.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    /// Set the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.http.tls = tls;
        self
    }

    /// Set how the credential is attached.
    #[must_use]
    pub const fn with_credential_carrier(mut self, carrier: CredentialCarrier) -> Self {
        self.credential_carrier = carrier;
        self
    }

    /// Whether the connection is made over TLS.
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.addr.starts_with("https://") || self.http.tls.has_client_cert()
    }

    /// The address the Transport connects to.
    ///
    /// Trailing slashes are dropped, and a plain `http://` address is
    /// upgraded to `https://` when a client certificate is configured.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] when the address is not an
    /// absolute `http` or `https` URL.
    pub fn effective_addr(&self) -> VaultResult<String> {
        let mut url = Url::parse(&self.addr)
            .map_err(|e| VaultError::invalid_config(format!("address `{}`: {e}", self.addr)))?;

        let addr = self.addr.trim_end_matches('/');
        match url.scheme() {
            "https" => Ok(addr.to_string()),
            "http" if self.http.tls.has_client_cert() => {
                url.set_scheme("https").map_err(|()| {
                    VaultError::invalid_config(format!("address `{}` cannot use https", self.addr))
                })?;
                Ok(url.as_str().trim_end_matches('/').to_string())
            }
            "http" => Ok(addr.to_string()),
            other => Err(VaultError::invalid_config(format!(
                "address `{}` has unsupported scheme `{other}`",
                self.addr
            ))),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
