//! Vault error types using thiserror 2.0.
//!
//! Status codes are classified once, in the Transport, into [`HttpError`].
//! Façade endpoints re-wrap a few of them: mount lifecycle failures become
//! [`MountError`], authentication failures become [`LoginError`] and
//! `404` on a lookup becomes [`VaultError::NotFound`].

use serde_json::Value;
use std::fmt;
use thiserror::Error;
use vault_common::HttpBuildError;

/// Classification of a non-success HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpErrorKind {
    /// 400: missing or invalid data
    InvalidRequest,
    /// 401: bad or missing credential
    Unauthorized,
    /// 403: credential lacks the capability
    Forbidden,
    /// 404: the path does not exist, or the caller may not know it does
    InvalidPath,
    /// 429: rate limit exceeded
    RateLimited,
    /// 500: internal server error
    InternalError,
    /// 503: sealed or down for maintenance
    Unavailable,
    /// Any other status
    Other,
}

impl HttpErrorKind {
    /// Classify a status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::InvalidPath,
            429 => Self::RateLimited,
            500 => Self::InternalError,
            503 => Self::Unavailable,
            _ => Self::Other,
        }
    }

    /// Short name of the classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::InvalidPath => "invalid path",
            Self::RateLimited => "rate limited",
            Self::InternalError => "internal server error",
            Self::Unavailable => "unavailable",
            Self::Other => "http error",
        }
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded body of a failed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorPayload {
    /// Human readable messages (the `errors` array, or the text body)
    pub errors: Vec<String>,
    /// The body as received: JSON when the server said so, else a string
    pub body: Value,
}

impl ErrorPayload {
    /// Build a payload from a decoded JSON body.
    #[must_use]
    pub fn from_json(body: Value) -> Self {
        let errors = body
            .get("errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Self { errors, body }
    }

    /// Build a payload from a plain text body.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let errors = if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.trim().to_string()]
        };
        Self {
            errors,
            body: Value::String(text),
        }
    }
}

/// A classified HTTP failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} ({status}): {}", .payload.errors.join("; "))]
pub struct HttpError {
    /// The response status code
    pub status: u16,
    /// Its classification
    pub kind: HttpErrorKind,
    /// The decoded error body
    pub payload: ErrorPayload,
}

impl HttpError {
    /// Create an error for a status and payload.
    #[must_use]
    pub const fn new(status: u16, payload: ErrorPayload) -> Self {
        Self {
            status,
            kind: HttpErrorKind::from_status(status),
            payload,
        }
    }

    /// The server's error messages.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.payload.errors
    }

    /// Whether the failure is transient. The client never retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            HttpErrorKind::RateLimited | HttpErrorKind::Unavailable
        )
    }
}

/// A response body did not have the expected shape.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A required field is missing or has the wrong type
    #[error("malformed {shape} response: {source}")]
    Shape {
        /// The target shape
        shape: &'static str,
        /// serde's description of the mismatch
        #[source]
        source: serde_json::Error,
    },

    /// A required field is absent
    #[error("{shape} response is missing `{field}`")]
    MissingField {
        /// The target shape
        shape: &'static str,
        /// The absent field
        field: &'static str,
    },

    /// Attempted to decode a response without a body (204)
    #[error("{shape} response has no body")]
    EmptyBody {
        /// The target shape
        shape: &'static str,
    },

    /// The body is not JSON at all
    #[error("response body is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mount lifecycle failure (mount, unmount, remount, enable, disable).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{operation} of `{name}` failed: {}", .errors.join("; "))]
pub struct MountError {
    /// The lifecycle operation
    pub operation: &'static str,
    /// The mount point involved
    pub name: String,
    /// The server's explanation
    pub errors: Vec<String>,
    /// The underlying HTTP failure
    #[source]
    pub source: HttpError,
}

impl MountError {
    /// Wrap an HTTP failure.
    #[must_use]
    pub fn from_http(operation: &'static str, name: impl Into<String>, error: HttpError) -> Self {
        Self {
            operation,
            name: name.into(),
            errors: error.payload.errors.clone(),
            source: error,
        }
    }
}

/// Authentication failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("login on `{mount}` failed ({status}): {}", .errors.join("; "))]
pub struct LoginError {
    /// The auth mount used
    pub mount: String,
    /// Status code of the rejection
    pub status: u16,
    /// The server's explanation
    pub errors: Vec<String>,
}

impl LoginError {
    /// Wrap an HTTP failure.
    #[must_use]
    pub fn from_http(mount: impl Into<String>, error: &HttpError) -> Self {
        Self {
            mount: mount.into(),
            status: error.status,
            errors: error.payload.errors.clone(),
        }
    }
}

/// Vault client errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Network-level failure: the exchange did not complete
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with an unexpected body
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Mount lifecycle failure
    #[error(transparent)]
    Mount(#[from] MountError),

    /// Authentication failure
    #[error(transparent)]
    Login(#[from] LoginError),

    /// The item does not exist, or the caller may not see it
    #[error("{0} does not exist")]
    NotFound(String),

    /// No backend of that type is registered
    #[error("unknown {family} backend type `{kind}`")]
    UnknownBackend {
        /// Registry family (auth, secret)
        family: &'static str,
        /// The requested type
        kind: String,
    },

    /// The backend type does not offer the operation
    #[error("`{kind}` backends do not support {operation}")]
    Unsupported {
        /// The backend type
        kind: String,
        /// The attempted operation
        operation: &'static str,
    },

    /// Invalid configuration or arguments
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be built
    #[error(transparent)]
    Client(#[from] HttpBuildError),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// The classified HTTP failure, if this is one.
    #[must_use]
    pub const fn http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this is a classified failure of the given kind.
    #[must_use]
    pub fn is_http(&self, kind: HttpErrorKind) -> bool {
        self.http().is_some_and(|err| err.kind == kind)
    }

    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Remap `InvalidPath` to [`VaultError::NotFound`], leave everything else.
pub(crate) fn not_found_on_404(what: impl Into<String>) -> impl FnOnce(VaultError) -> VaultError {
    move |err| {
        if err.is_http(HttpErrorKind::InvalidPath) {
            VaultError::NotFound(what.into())
        } else {
            err
        }
    }
}

/// Wrap classified HTTP failures of a mount lifecycle call into [`MountError`].
pub(crate) fn mount_failure(
    operation: &'static str,
    name: impl Into<String>,
) -> impl FnOnce(VaultError) -> VaultError {
    move |err| match err {
        VaultError::Http(http) => MountError::from_http(operation, name, http).into(),
        other => other,
    }
}

/// Wrap classified HTTP failures of a login into [`LoginError`].
pub(crate) fn login_failure(mount: impl Into<String>) -> impl FnOnce(VaultError) -> VaultError {
    move |err| match err {
        VaultError::Http(http) => LoginError::from_http(mount, &http).into(),
        other => other,
    }
}
