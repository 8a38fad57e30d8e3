//! Transport: one HTTP session against one server, one credential.
//!
//! Every endpoint funnels through [`Transport::request`]. It builds
//! `{addr}/{version}{path}`, strips top-level nulls from query parameters and
//! JSON bodies, attaches the credential, and classifies any status other
//! than 200/204 into an [`HttpError`]. The body is read completely before
//! returning, so decoding a [`RawResponse`] never suspends.

use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use vault_common::build_http_client;

use crate::config::{CredentialCarrier, VaultConfig};
use crate::error::{DecodeError, ErrorPayload, HttpError, VaultError, VaultResult};
use crate::objects::Decode;

/// Header carrying the credential.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Name of the cookie carrying the credential.
pub const TOKEN_COOKIE: &str = "token";

/// A successful (200 or 204) response, fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl RawResponse {
    /// Assemble a response from its parts.
    #[must_use]
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    /// The status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Whether the server confirmed the call (200 or 204).
    #[must_use]
    pub const fn ok(&self) -> bool {
        matches!(self.status, 200 | 204)
    }

    /// Whether the response carries no body by contract.
    #[must_use]
    pub const fn is_no_content(&self) -> bool {
        self.status == 204
    }

    /// The `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    fn check_body(&self, shape: &'static str) -> Result<(), DecodeError> {
        if self.is_no_content() || self.body.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::EmptyBody { shape });
        }
        Ok(())
    }

    /// Parse the body as untyped JSON.
    ///
    /// # Errors
    ///
    /// Fails on a 204 or empty body, or a body that is not JSON.
    pub fn value(&self) -> Result<Value, DecodeError> {
        self.check_body("json")?;
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parse the body into any deserializable type.
    ///
    /// # Errors
    ///
    /// Fails on a 204 or empty body, or when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        self.check_body(std::any::type_name::<T>())?;
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode the body into one of the typed result records.
    ///
    /// # Errors
    ///
    /// Fails on a 204 or empty body, or when a required field is absent.
    pub fn decode<T: Decode>(&self) -> Result<T, DecodeError> {
        self.check_body(T::SHAPE)?;
        T::decode(serde_json::from_slice(&self.body)?)
    }

    fn into_http_error(self) -> HttpError {
        let payload = if self.is_json() {
            serde_json::from_slice(&self.body).map_or_else(
                |_| ErrorPayload::from_text(String::from_utf8_lossy(&self.body)),
                ErrorPayload::from_json,
            )
        } else {
            ErrorPayload::from_text(String::from_utf8_lossy(&self.body))
        };
        HttpError::new(self.status, payload)
    }
}

/// Drop top-level `null` entries of a JSON object.
///
/// The server treats an absent key and a `null` key differently, so callers
/// describe optional arguments as `null` and let the Transport remove them.
/// Nested values are caller data and are kept as given.
#[must_use]
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}

fn query_pairs(params: Value) -> VaultResult<Vec<(String, String)>> {
    let Value::Object(map) = strip_nulls(params) else {
        return Err(VaultError::invalid_config(
            "query parameters must be a JSON object",
        ));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

fn has_content(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// HTTP session bound to one server address and one credential.
///
/// Requests on one Transport share its connection pool and credential.
/// Fan out concurrent work across identities with one Transport each.
pub struct Transport {
    addr: String,
    version: String,
    http: Client,
    credential: RwLock<Option<SecretString>>,
    carrier: CredentialCarrier,
    tls: bool,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("addr", &self.addr)
            .field("version", &self.version)
            .field("carrier", &self.carrier)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Create a Transport from a configuration.
    ///
    /// # Errors
    ///
    /// Fails when the address is invalid or the HTTP client (TLS material
    /// included) cannot be built.
    pub fn new(config: &VaultConfig) -> VaultResult<Self> {
        let addr = config.effective_addr()?;
        if !config.addr.starts_with(&addr) {
            warn!(from = %config.addr, to = %addr, "client certificate configured, switching to https");
        }

        let tls = config.uses_tls();
        if tls {
            info!(addr = %addr, "using TLS");
        }

        Ok(Self {
            addr,
            version: config.version.clone(),
            http: build_http_client(&config.http)?,
            credential: RwLock::new(config.token.clone()),
            carrier: config.credential_carrier,
            tls,
        })
    }

    /// The server address, as connected to.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The API version prefix.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the connection uses TLS.
    #[must_use]
    pub const fn uses_tls(&self) -> bool {
        self.tls
    }

    /// The current credential.
    pub async fn credential(&self) -> Option<SecretString> {
        self.credential.read().await.clone()
    }

    /// Replace the credential used by every subsequent request.
    pub async fn set_credential(&self, token: impl Into<String>) {
        *self.credential.write().await = Some(SecretString::from(token.into()));
        info!("credential updated");
    }

    /// Send subsequent requests anonymously.
    pub async fn clear_credential(&self) {
        *self.credential.write().await = None;
        info!("credential cleared");
    }

    /// Full URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}/{}{}", self.addr, self.version, path)
        } else {
            format!("{}/{}/{}", self.addr, self.version, path)
        }
    }

    /// Perform one exchange.
    ///
    /// # Errors
    ///
    /// [`VaultError::Transport`] when no response was received,
    /// [`VaultError::Http`] for any status other than 200 and 204.
    #[instrument(skip(self, params, body))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: Option<Value>,
        body: Option<Value>,
    ) -> VaultResult<RawResponse> {
        let mut request = self.http.request(method, self.url(path));

        if let Some(params) = params {
            let query = query_pairs(params)?;
            if !query.is_empty() {
                request = request.query(&query);
            }
        }

        if let Some(body) = body.map(strip_nulls).filter(has_content) {
            let bytes = serde_json::to_vec(&body).map_err(DecodeError::from)?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        {
            let credential = self.credential.read().await;
            if let Some(token) = credential.as_ref() {
                let token = token.expose_secret();
                if self.carrier.uses_header() {
                    request = request.header(TOKEN_HEADER, token);
                }
                if self.carrier.uses_cookie() {
                    request = request.header(COOKIE, format!("{TOKEN_COOKIE}={token}"));
                }
            }
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "no response from server");
            VaultError::Transport(e)
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        let raw = RawResponse::new(status, content_type, body);

        if raw.ok() {
            debug!(status, "request succeeded");
            return Ok(raw);
        }

        let error = raw.into_http_error();
        warn!(status, kind = %error.kind, "request rejected");
        Err(error.into())
    }

    /// `GET` without parameters.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn get(&self, path: &str) -> VaultResult<RawResponse> {
        self.request(Method::GET, path, None, None).await
    }

    /// `GET` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn get_with(&self, path: &str, params: Value) -> VaultResult<RawResponse> {
        self.request(Method::GET, path, Some(params), None).await
    }

    /// `PUT` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn put(&self, path: &str, body: Option<Value>) -> VaultResult<RawResponse> {
        self.request(Method::PUT, path, None, body).await
    }

    /// `POST` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn post(&self, path: &str, body: Option<Value>) -> VaultResult<RawResponse> {
        self.request(Method::POST, path, None, body).await
    }

    /// `DELETE`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn delete(&self, path: &str) -> VaultResult<RawResponse> {
        self.request(Method::DELETE, path, None, None).await
    }

    /// `LIST`, the server's listing verb.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn list(&self, path: &str) -> VaultResult<RawResponse> {
        let method = Method::from_bytes(b"LIST")
            .map_err(|e| VaultError::invalid_config(e.to_string()))?;
        self.request(method, path, None, None).await
    }
}
