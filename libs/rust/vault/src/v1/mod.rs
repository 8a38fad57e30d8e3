//! Endpoint groups of the `v1` API.
//!
//! Each endpoint borrows the client's [`Transport`](crate::request::Transport)
//! and maps its methods onto HTTP verbs and paths. Listings of mounted
//! backends are adapted into name-indexed collections whose handles are only
//! built on access, once the server has told us the backend type.

pub mod audit;
pub mod auth;
pub mod lease;
pub mod policy;
pub mod raw;
pub mod seal;
pub mod secret;
pub mod sys;

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use audit::{AuditCollection, AuditEndpoint, AuditOptions};
pub use auth::{AuthBackend, AuthCollection, AuthEndpoint, AuthKind, LoginCredentials, TokenRequest, TokenStore};
pub use lease::LeaseEndpoint;
pub use policy::PolicyEndpoint;
pub use raw::RawEndpoint;
pub use seal::{SealEndpoint, SealState, UnsealSession};
pub use secret::{SecretBackend, SecretCollection, SecretEndpoint, SecretKind};
pub use sys::SysEndpoint;

/// One entry of a mount listing (`/sys/mounts`, `/sys/auth`, `/sys/audit`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Mount name, without the trailing slash
    pub name: String,
    /// Backend type
    pub kind: String,
    /// Operator description
    pub description: String,
    /// Backend settings (`config` for mounts, `options` for audit devices)
    pub settings: Map<String, Value>,
}

impl MountInfo {
    fn from_entry(key: &str, entry: &Map<String, Value>) -> Option<Self> {
        let kind = entry.get("type")?.as_str()?.to_string();
        let settings = entry
            .get("config")
            .or_else(|| entry.get("options"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Some(Self {
            name: key.trim_end_matches('/').to_string(),
            kind,
            description: entry
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            settings,
        })
    }
}

/// Index a mount listing by name.
///
/// Newer servers nest the table under `data` and add response metadata at
/// the top level; entries without a `type` are not mounts and are skipped.
pub(crate) fn mount_table(body: Value) -> BTreeMap<String, MountInfo> {
    let Value::Object(mut top) = body else {
        return BTreeMap::new();
    };
    let table = match top.remove("data") {
        Some(Value::Object(data)) => data,
        _ => top,
    };

    table
        .iter()
        .filter_map(|(key, entry)| entry.as_object().and_then(|e| MountInfo::from_entry(key, e)))
        .map(|info| (info.name.clone(), info))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mount_table_flat() {
        let table = mount_table(json!({
            "secret/": {"type": "generic", "description": "generic secret storage", "config": {"default_lease_ttl": 0}},
            "sys/": {"type": "system", "description": "system endpoints"}
        }));

        assert_eq!(table.len(), 2);
        let secret = &table["secret"];
        assert_eq!(secret.kind, "generic");
        assert_eq!(secret.settings.get("default_lease_ttl"), Some(&json!(0)));
    }

    #[test]
    fn test_mount_table_nested_under_data() {
        let table = mount_table(json!({
            "request_id": "1",
            "lease_id": "",
            "data": {"file/": {"type": "file", "description": "", "options": {"path": "/tmp/audit.log"}}}
        }));

        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["file"]);
        assert_eq!(table["file"].settings.get("path"), Some(&json!("/tmp/audit.log")));
    }

    #[test]
    fn test_mount_table_skips_metadata() {
        let table = mount_table(json!({
            "token/": {"type": "token", "description": "token based credentials"},
            "lease_duration": 0,
            "renewable": false
        }));
        assert_eq!(table.len(), 1);
        assert!(mount_table(json!([])).is_empty());
    }
}
