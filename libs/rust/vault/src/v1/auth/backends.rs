//! Type-specific management of auth backends.

use serde_json::{Value, json};
use tracing::{info, instrument};

use super::AuthBackend;
use crate::error::{VaultResult, not_found_on_404};
use crate::objects::SecretValue;
use crate::util::{Ttl, format_duration, format_policies};

impl AuthBackend {
    async fn read_entry(&self, suffix: &str, what: String) -> VaultResult<SecretValue> {
        Ok(self
            .mount_point()
            .transport()
            .get(&self.path(suffix))
            .await
            .map_err(not_found_on_404(what))?
            .decode()?)
    }

    async fn post_entry(&self, suffix: &str, body: Value) -> VaultResult<bool> {
        Ok(self
            .mount_point()
            .transport()
            .post(&self.path(suffix), Some(body))
            .await?
            .ok())
    }

    async fn delete_entry(&self, suffix: &str) -> VaultResult<bool> {
        Ok(self
            .mount_point()
            .transport()
            .delete(&self.path(suffix))
            .await?
            .ok())
    }
}

/// `userpass` user management.
#[derive(Debug, Clone, Copy)]
pub struct UserPassBackend<'a> {
    backend: &'a AuthBackend,
}

impl<'a> UserPassBackend<'a> {
    pub(super) const fn new(backend: &'a AuthBackend) -> Self {
        Self { backend }
    }

    /// Create or update a user.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, password, policies), fields(mount = self.backend.name()))]
    pub async fn create_user<I, S>(&self, username: &str, password: &str, policies: I) -> VaultResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = json!({
            "password": password,
            "policies": format_policies(policies),
        });
        let created = self.backend.post_entry(&format!("users/{username}"), body).await?;
        info!("user written");
        Ok(created)
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_user(&self, username: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("users/{username}")).await
    }
}

/// Connection settings of an LDAP backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapConfig {
    /// `ldap://` or `ldaps://` server URL
    pub url: String,
    /// Attribute matched against the username, e.g. `uid`
    pub userattr: Option<String>,
    /// Base DN of users, e.g. `ou=People,dc=example,dc=org`
    pub userdn: Option<String>,
    /// Base DN of groups, e.g. `ou=Groups,dc=example,dc=org`
    pub groupdn: Option<String>,
}

/// `ldap` configuration and group policies.
#[derive(Debug, Clone, Copy)]
pub struct LdapBackend<'a> {
    backend: &'a AuthBackend,
}

impl<'a> LdapBackend<'a> {
    pub(super) const fn new(backend: &'a AuthBackend) -> Self {
        Self { backend }
    }

    /// Configure the LDAP server.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = self.backend.name(), url = %config.url))]
    pub async fn configure(&self, config: &LdapConfig) -> VaultResult<bool> {
        let body = json!({
            "url": config.url,
            "userattr": config.userattr,
            "userdn": config.userdn,
            "groupdn": config.groupdn,
        });
        self.backend.post_entry("config", body).await
    }

    /// Policies granted to a group.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`](crate::VaultError::NotFound) for an unknown
    /// group.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn read_group(&self, name: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("groups/{name}"), format!("ldap group `{name}`"))
            .await
    }

    /// Grant policies to a group.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, policies), fields(mount = self.backend.name()))]
    pub async fn write_group<I, S>(&self, name: &str, policies: I) -> VaultResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = json!({ "policies": format_policies(policies) });
        self.backend.post_entry(&format!("groups/{name}"), body).await
    }

    /// Remove a group. Logins already made by its members stay valid.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_group(&self, name: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("groups/{name}")).await
    }
}

/// `github` organization and team policies.
#[derive(Debug, Clone, Copy)]
pub struct GitHubBackend<'a> {
    backend: &'a AuthBackend,
}

impl<'a> GitHubBackend<'a> {
    pub(super) const fn new(backend: &'a AuthBackend) -> Self {
        Self { backend }
    }

    /// Restrict logins to members of an organization.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn configure(&self, organization: &str) -> VaultResult<bool> {
        self.backend
            .post_entry("config", json!({ "organization": organization }))
            .await
    }

    /// Grant policies to a team.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, policies), fields(mount = self.backend.name()))]
    pub async fn write_team<I, S>(&self, team: &str, policies: I) -> VaultResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = json!({ "value": format_policies(policies) });
        self.backend.post_entry(&format!("map/teams/{team}"), body).await
    }
}

/// `app-id` app and user mappings.
#[derive(Debug, Clone, Copy)]
pub struct AppIdBackend<'a> {
    backend: &'a AuthBackend,
}

impl<'a> AppIdBackend<'a> {
    pub(super) const fn new(backend: &'a AuthBackend) -> Self {
        Self { backend }
    }

    /// Read an app mapping.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`](crate::VaultError::NotFound) for an unknown
    /// app.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn read_app(&self, app_id: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("map/app-id/{app_id}"), format!("app `{app_id}`"))
            .await
    }

    /// Map an app to policies. The display name defaults to the app id.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, policies), fields(mount = self.backend.name()))]
    pub async fn write_app<I, S>(&self, app_id: &str, policies: I, display_name: Option<&str>) -> VaultResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = json!({
            "value": format_policies(policies),
            "display_name": display_name.unwrap_or(app_id),
        });
        self.backend.post_entry(&format!("map/app-id/{app_id}"), body).await
    }

    /// Delete an app mapping.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_app(&self, app_id: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("map/app-id/{app_id}")).await
    }

    /// Read a user mapping.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`](crate::VaultError::NotFound) for an unknown
    /// user.
    #[instrument(skip_all, fields(mount = self.backend.name()))]
    pub async fn read_user(&self, user_id: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("map/user-id/{user_id}"), "app-id user".to_string())
            .await
    }

    /// Map a user id to an app, optionally only from a CIDR block.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, user_id), fields(mount = self.backend.name()))]
    pub async fn write_user(&self, user_id: &str, app_id: &str, cidr_block: Option<&str>) -> VaultResult<bool> {
        let body = json!({
            "value": app_id,
            "cidr_block": cidr_block,
        });
        self.backend
            .post_entry(&format!("map/user-id/{user_id}"), body)
            .await
    }

    /// Delete a user mapping.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip_all, fields(mount = self.backend.name()))]
    pub async fn delete_user(&self, user_id: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("map/user-id/{user_id}")).await
    }
}

/// A trusted certificate of a `cert` backend.
#[derive(Debug, Clone, Default)]
pub struct CertEntry {
    /// PEM-encoded certificate
    pub certificate: String,
    /// Display name of clients using it
    pub display_name: Option<String>,
    /// Policies granted to its clients
    pub policies: Vec<String>,
    /// Lease of issued credentials
    pub lease: Option<Ttl>,
}

/// `cert` trusted certificates.
#[derive(Debug, Clone, Copy)]
pub struct CertBackend<'a> {
    backend: &'a AuthBackend,
}

impl<'a> CertBackend<'a> {
    pub(super) const fn new(backend: &'a AuthBackend) -> Self {
        Self { backend }
    }

    /// Trust a certificate under a name.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self, entry), fields(mount = self.backend.name()))]
    pub async fn write_cert(&self, name: &str, entry: &CertEntry) -> VaultResult<bool> {
        let body = json!({
            "certificate": entry.certificate,
            "display_name": entry.display_name,
            "policies": format_policies(&entry.policies),
            "lease": entry.lease.clone().map(format_duration),
        });
        self.backend.post_entry(&format!("certs/{name}"), body).await
    }

    /// Read a trusted certificate.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`](crate::VaultError::NotFound) for an unknown
    /// name.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn read_cert(&self, name: &str) -> VaultResult<SecretValue> {
        self.backend
            .read_entry(&format!("certs/{name}"), format!("certificate `{name}`"))
            .await
    }

    /// Stop trusting a certificate. Existing logins stay valid until renewal.
    ///
    /// # Errors
    ///
    /// Fails on transport or HTTP errors.
    #[instrument(skip(self), fields(mount = self.backend.name()))]
    pub async fn delete_cert(&self, name: &str) -> VaultResult<bool> {
        self.backend.delete_entry(&format!("certs/{name}")).await
    }
}
