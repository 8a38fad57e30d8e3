//! Argument formatting shared by the endpoints.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;

use crate::error::{VaultError, VaultResult};

/// A lease or TTL argument: a number of seconds or a server duration string
/// such as `"1h"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ttl {
    /// Whole seconds
    Seconds(u64),
    /// Passed through verbatim
    Text(String),
}

impl From<u64> for Ttl {
    fn from(secs: u64) -> Self {
        Self::Seconds(secs)
    }
}

impl From<u32> for Ttl {
    fn from(secs: u32) -> Self {
        Self::Seconds(u64::from(secs))
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self::Seconds(duration.as_secs())
    }
}

impl From<&str> for Ttl {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Ttl {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Render a TTL the way the server parses durations: seconds become `"Ns"`,
/// strings are kept as given.
#[must_use]
pub fn format_duration(ttl: impl Into<Ttl>) -> String {
    match ttl.into() {
        Ttl::Seconds(secs) => format!("{secs}s"),
        Ttl::Text(text) => text,
    }
}

/// Join policy names with commas, the form auth backends expect.
#[must_use]
pub fn format_policies<I, S>(policies: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    policies
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn base64_encode(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data)
}

pub(crate) fn base64_decode(data: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(data)
        .map_err(|e| VaultError::invalid_config(format!("invalid base64 from server: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3600u64), "3600s");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration("1h"), "1h");
    }

    #[test]
    fn test_format_policies() {
        assert_eq!(format_policies(["root", "dev"]), "root,dev");
        assert_eq!(format_policies(vec!["solo".to_string()]), "solo");
        assert_eq!(format_policies(Vec::<String>::new()), "");
    }

    #[test]
    fn test_base64() {
        let encoded = base64_encode("the quick brown fox");
        assert_eq!(encoded, "dGhlIHF1aWNrIGJyb3duIGZveA==");
        assert_eq!(base64_decode(&encoded).unwrap(), b"the quick brown fox");
        assert!(base64_decode("%%%").is_err());
    }
}
