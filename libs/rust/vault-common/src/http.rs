//! HTTP client configuration and building.
//!
//! Every Transport owns exactly one `reqwest::Client`, built here from an
//! [`HttpConfig`]. TLS material (client identity for mutual TLS, extra
//! root certificates) is loaded from disk at build time.

use crate::error::HttpBuildError;
use reqwest::{Certificate, Client, ClientBuilder, Identity};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// TLS material and verification policy.
///
/// Peer verification is an explicit switch. It is **off** by default, which
/// matches what a development server with a self-signed certificate needs
/// and is insecure anywhere else. Supplying a CA through
/// [`TlsConfig::with_ca_cert`] or [`TlsConfig::with_ca_path`] turns it on;
/// [`TlsConfig::with_verify_peer`] overrides it either way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM client certificate for mutual TLS
    pub client_cert: Option<PathBuf>,
    /// PEM private key matching `client_cert`
    pub client_key: Option<PathBuf>,
    /// PEM bundle of trusted CAs
    pub ca_cert: Option<PathBuf>,
    /// Directory of PEM CA certificates
    pub ca_path: Option<PathBuf>,
    /// Verify the server certificate chain and hostname
    pub verify_peer: bool,
}

impl TlsConfig {
    /// Use a client certificate and key for mutual authentication.
    #[must_use]
    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Trust the CAs in a PEM bundle and verify the peer.
    #[must_use]
    pub fn with_ca_cert(mut self, bundle: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(bundle.into());
        self.verify_peer = true;
        self
    }

    /// Trust every PEM certificate in a directory and verify the peer.
    #[must_use]
    pub fn with_ca_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(dir.into());
        self.verify_peer = true;
        self
    }

    /// Force peer verification on or off.
    #[must_use]
    pub const fn with_verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    /// Whether a client identity is configured.
    #[must_use]
    pub const fn has_client_cert(&self) -> bool {
        self.client_cert.is_some() || self.client_key.is_some()
    }

    fn identity(&self) -> Result<Option<Identity>, HttpBuildError> {
        let (cert, key) = match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => (cert, key),
            (None, None) => return Ok(None),
            _ => return Err(HttpBuildError::IncompleteIdentity),
        };

        let mut pem = read(cert)?;
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend(read(key)?);

        Ok(Some(Identity::from_pem(&pem)?))
    }

    fn roots(&self) -> Result<Vec<Certificate>, HttpBuildError> {
        let mut roots = Vec::new();

        if let Some(bundle) = &self.ca_cert {
            roots.push(Certificate::from_pem(&read(bundle)?)?);
        }

        if let Some(dir) = &self.ca_path {
            let entries = std::fs::read_dir(dir).map_err(|e| HttpBuildError::io(dir, e))?;
            for entry in entries {
                let path = entry.map_err(|e| HttpBuildError::io(dir, e))?.path();
                if is_pem(&path) {
                    roots.push(Certificate::from_pem(&read(&path)?)?);
                }
            }
        }

        Ok(roots)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, HttpBuildError> {
    std::fs::read(path).map_err(|e| HttpBuildError::io(path, e))
}

fn is_pem(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "pem" | "crt" | "cer"))
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
    /// TLS material and verification policy
    pub tls: TlsConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: concat!("vault-client-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            tls: TlsConfig::default(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the pool settings.
    #[must_use]
    pub const fn with_pool_config(mut self, idle_timeout: Duration, max_idle: usize) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Set the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }
}

/// Build a configured HTTP client.
///
/// Creates a rustls-backed reqwest client with connection pooling, the
/// client identity and extra roots from `config.tls`, and certificate
/// verification as `config.tls.verify_peer` dictates.
///
/// # Errors
///
/// Returns an error if TLS material cannot be read or parsed, or if the
/// client cannot be built.
///
/// # Examples
///
/// ```
/// use vault_common::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::default().with_timeout(Duration::from_secs(60));
/// let client = build_http_client(&config);
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, HttpBuildError> {
    let tls = &config.tls;

    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .danger_accept_invalid_certs(!tls.verify_peer);

    if let Some(identity) = tls.identity()? {
        debug!("loaded client certificate for mutual TLS");
        builder = builder.identity(identity);
    }

    for root in tls.roots()? {
        builder = builder.add_root_certificate(root);
    }

    if !tls.verify_peer {
        warn!("TLS peer verification is disabled");
    }

    Ok(builder.build()?)
}
