//! Static backend registration.
//!
//! A [`Registry`] maps a backend type string, as reported by the server in
//! mount listings, to a constructor for the handle that drives it. Tables are
//! filled when a client is built; looking up an unregistered type is an
//! explicit [`VaultError::UnknownBackend`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{VaultError, VaultResult};
use crate::request::Transport;

/// A mounted backend: its mount name, its type and the Transport it uses.
#[derive(Clone)]
pub struct MountPoint {
    name: String,
    kind: String,
    transport: Arc<Transport>,
}

impl MountPoint {
    /// Describe a mount. Surrounding slashes of `name` are dropped.
    #[must_use]
    pub fn new(name: impl AsRef<str>, kind: impl Into<String>, transport: Arc<Transport>) -> Self {
        Self {
            name: name.as_ref().trim_matches('/').to_string(),
            kind: kind.into(),
            transport,
        }
    }

    /// Mount name, without slashes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend type.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The Transport shared with the client.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.name = name.trim_matches('/').to_string();
    }
}

impl fmt::Debug for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountPoint")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Builds a handle for a mount.
pub type Constructor<H> = fn(MountPoint) -> H;

/// Table from backend type to handle constructor.
pub struct Registry<H> {
    family: &'static str,
    table: BTreeMap<String, Constructor<H>>,
}

impl<H> Registry<H> {
    /// An empty registry for one family of backends (`auth`, `secret`).
    #[must_use]
    pub const fn new(family: &'static str) -> Self {
        Self {
            family,
            table: BTreeMap::new(),
        }
    }

    /// Registry family.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        self.family
    }

    /// Register a constructor, replacing and returning any previous one.
    pub fn register(&mut self, kind: impl Into<String>, constructor: Constructor<H>) -> Option<Constructor<H>> {
        self.table.insert(kind.into(), constructor)
    }

    /// Whether a type is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }

    /// Registered types, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Build the handle for a mount, using the mount's type.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::UnknownBackend`] when the type is not registered.
    pub fn load(&self, mount: MountPoint) -> VaultResult<H> {
        let constructor = self
            .table
            .get(mount.kind())
            .ok_or_else(|| VaultError::UnknownBackend {
                family: self.family,
                kind: mount.kind().to_string(),
            })?;
        Ok(constructor(mount))
    }
}

impl<H> Clone for Registry<H> {
    fn clone(&self) -> Self {
        Self {
            family: self.family,
            table: self.table.clone(),
        }
    }
}

impl<H> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("family", &self.family)
            .field("kinds", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;

    fn mount(name: &str, kind: &str) -> MountPoint {
        let transport = Transport::new(&VaultConfig::new("http://127.0.0.1:8200")).unwrap();
        MountPoint::new(name, kind, Arc::new(transport))
    }

    fn describe(mount: MountPoint) -> String {
        format!("{}:{}", mount.kind(), mount.name())
    }

    #[test]
    fn test_load_registered() {
        let mut registry: Registry<String> = Registry::new("secret");
        registry.register("generic", describe);

        assert!(registry.contains("generic"));
        assert_eq!(registry.load(mount("/secret/", "generic")).unwrap(), "generic:secret");
    }

    #[test]
    fn test_unknown_kind() {
        let registry: Registry<String> = Registry::new("auth");
        let err = registry.load(mount("x", "kerberos")).unwrap_err();
        assert!(matches!(
            err,
            VaultError::UnknownBackend { family: "auth", ref kind } if kind == "kerberos"
        ));
    }

    #[test]
    fn test_register_replaces() {
        fn other(_: MountPoint) -> String {
            "other".to_string()
        }

        let mut registry: Registry<String> = Registry::new("secret");
        assert!(registry.register("kv", describe).is_none());
        assert!(registry.register("kv", other).is_some());
        assert_eq!(registry.load(mount("kv", "kv")).unwrap(), "other");
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["kv"]);
    }
}
