//! Audit devices.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{info, instrument};

use super::{MountInfo, mount_table};
use crate::error::{VaultError, VaultResult};
use crate::request::Transport;

/// Settings of an audit device, by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOptions {
    /// Append to a file
    File {
        /// Log file path on the server
        path: String,
        /// Log secrets unhashed
        log_raw: bool,
    },
    /// Send to the local syslog
    Syslog {
        /// Syslog facility
        facility: String,
        /// Program tag
        tag: String,
        /// Log secrets unhashed
        log_raw: bool,
    },
}

impl AuditOptions {
    /// A file device.
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            log_raw: false,
        }
    }

    /// A syslog device with facility `AUTH` and tag `vault`.
    #[must_use]
    pub fn syslog() -> Self {
        Self::Syslog {
            facility: "AUTH".to_string(),
            tag: "vault".to_string(),
            log_raw: false,
        }
    }

    /// Log secrets unhashed.
    #[must_use]
    pub fn with_log_raw(mut self, raw: bool) -> Self {
        match &mut self {
            Self::File { log_raw, .. } | Self::Syslog { log_raw, .. } => *log_raw = raw,
        }
        self
    }

    /// Device type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Syslog { .. } => "syslog",
        }
    }

    /// Options as the server takes them: every value is a string.
    #[must_use]
    pub fn to_options(&self) -> Value {
        let flag = |b: bool| if b { "true" } else { "false" };
        match self {
            Self::File { path, log_raw } => json!({
                "path": path,
                "log_raw": flag(*log_raw),
            }),
            Self::Syslog {
                facility,
                tag,
                log_raw,
            } => json!({
                "facility": facility,
                "tag": tag,
                "log_raw": flag(*log_raw),
            }),
        }
    }
}

/// Enabled audit devices, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditCollection {
    devices: BTreeMap<String, MountInfo>,
}

impl AuditCollection {
    /// Look up a device.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] when no device has that name.
    pub fn get(&self, name: &str) -> VaultResult<&MountInfo> {
        self.devices
            .get(name.trim_end_matches('/'))
            .ok_or_else(|| VaultError::not_found(format!("audit device `{name}`")))
    }

    /// Whether a device is enabled.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name.trim_end_matches('/'))
    }

    /// Device names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// `/sys/audit`.
#[derive(Debug, Clone, Copy)]
pub struct AuditEndpoint<'a> {
    transport: &'a Transport,
}

impl<'a> AuditEndpoint<'a> {
    pub(crate) const fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Enabled devices.
    ///
    /// # Errors
    ///
    /// Fails on transport, HTTP or decode errors.
    #[instrument(skip(self))]
    pub async fn items(&self) -> VaultResult<AuditCollection> {
        let body = self.transport.get("/sys/audit").await?.value()?;
        Ok(AuditCollection {
            devices: mount_table(body),
        })
    }

    /// Enable a device.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, options), fields(kind = options.kind()))]
    pub async fn enable(&self, name: &str, options: &AuditOptions, description: Option<&str>) -> VaultResult<bool> {
        let body = json!({
            "type": options.kind(),
            "description": description,
            "options": options.to_options(),
        });
        let response = self.transport.put(&format!("/sys/audit/{name}"), Some(body)).await?;
        info!("audit device enabled");
        Ok(response.ok())
    }

    /// Disable a device.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self))]
    pub async fn disable(&self, name: &str) -> VaultResult<bool> {
        let response = self.transport.delete(&format!("/sys/audit/{name}")).await?;
        info!("audit device disabled");
        Ok(response.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_options() {
        let options = AuditOptions::file("/tmp/audit.log").with_log_raw(true);
        assert_eq!(options.kind(), "file");
        assert_eq!(options.to_options(), json!({"path": "/tmp/audit.log", "log_raw": "true"}));
    }

    #[test]
    fn test_syslog_defaults() {
        let options = AuditOptions::syslog();
        assert_eq!(options.kind(), "syslog");
        assert_eq!(
            options.to_options(),
            json!({"facility": "AUTH", "tag": "vault", "log_raw": "false"})
        );
    }

    #[test]
    fn test_collection_lookup() {
        let collection = AuditCollection {
            devices: mount_table(json!({"file/": {"type": "file", "description": "", "options": {}}})),
        };
        assert!(collection.contains("file"));
        assert_eq!(collection.get("file/").unwrap().kind, "file");
        assert!(matches!(collection.get("syslog"), Err(VaultError::NotFound(_))));
    }
}
