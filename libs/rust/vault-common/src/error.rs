//! Errors raised while assembling an HTTP client.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to build a configured HTTP client.
///
/// These happen once, at construction time, and are never retryable: the
/// configuration or the files it points to must be fixed.
#[derive(Error, Debug)]
pub enum HttpBuildError {
    /// A certificate, key or CA file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// The offending file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A client certificate was given without its private key, or the reverse
    #[error("client certificate and key must be supplied together")]
    IncompleteIdentity,

    /// The TLS backend rejected the material or the client settings
    #[error("TLS setup failed: {0}")]
    Tls(#[from] reqwest::Error),
}

impl HttpBuildError {
    /// Create an I/O error bound to a path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = HttpBuildError::io(
            "/etc/vault/client.pem",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "cannot read /etc/vault/client.pem: missing");
    }

    #[test]
    fn test_incomplete_identity_display() {
        assert_eq!(
            HttpBuildError::IncompleteIdentity.to_string(),
            "client certificate and key must be supplied together"
        );
    }
}
