//! Endpoint groups against the in-memory server.

use serde_json::json;
use test_utils::{FakeVault, fixtures};
use vault_client::v1::{AuditOptions, LoginCredentials, SecretKind, TokenRequest};
use vault_client::{Backend, HttpErrorKind, Policy, Rule, Vault, VaultError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn unsealed() -> (FakeVault, Vault) {
    test_utils::init_test_tracing();
    let fake = FakeVault::start_unsealed().await;
    let vault = Vault::connect(fake.uri()).unwrap();
    vault.set_token(fake.root_token().unwrap()).await;
    (fake, vault)
}

#[tokio::test]
async fn test_requests_without_credential_are_forbidden() {
    let (_fake, vault) = unsealed().await;
    vault.clear_token().await;

    let err = vault.policy().items().await.unwrap_err();
    assert!(err.is_http(HttpErrorKind::Forbidden));
}

#[tokio::test]
async fn test_secret_mounts() {
    let (fake, vault) = unsealed().await;

    let mounts = vault.secret().items().await.unwrap();
    assert!(mounts.contains("secret"));
    assert_eq!(mounts.get("secret").unwrap().kind(), &SecretKind::Generic);
    assert!(matches!(mounts.get("sys"), Err(VaultError::UnknownBackend { .. })));
    assert!(matches!(mounts.get("missing"), Err(VaultError::NotFound(_))));

    let (mounted, consul) = vault.secret().mount("consul", None, Some("consul creds")).await.unwrap();
    assert!(mounted);
    assert_eq!(consul.kind(), &SecretKind::Consul);
    assert!(fake.mount_names().contains(&"consul".to_string()));

    let mounts = vault.secret().items().await.unwrap();
    assert_eq!(mounts.info("consul").unwrap().description, "consul creds");
}

#[tokio::test]
async fn test_mount_conflict_is_mount_error() {
    let (_fake, vault) = unsealed().await;

    let err = vault.secret().mount("secret", Some("generic"), None).await.unwrap_err();
    let VaultError::Mount(mount) = err else {
        panic!("expected a mount error, got {err:?}");
    };
    assert_eq!(mount.operation, "mount");
    assert_eq!(mount.name, "secret");
    assert_eq!(mount.errors, ["existing mount at secret/"]);
    assert_eq!(mount.source.kind, HttpErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_mount_server_error_is_mount_error() {
    test_utils::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/mounts/x"))
        .respond_with(ResponseTemplate::new(500).set_body_json(fixtures::errors(&["storage backend failed"])))
        .expect(1)
        .mount(&server)
        .await;
    let vault = Vault::connect(server.uri()).unwrap();

    let err = vault.secret().mount("x", Some("generic"), None).await.unwrap_err();
    let VaultError::Mount(mount) = err else {
        panic!("expected a mount error, got {err:?}");
    };
    assert_eq!(mount.operation, "mount");
    assert_eq!(mount.name, "x");
    assert_eq!(mount.errors, ["storage backend failed"]);
    assert_eq!(mount.source.kind, HttpErrorKind::InternalError);
}

#[tokio::test]
async fn test_remount_moves_data_and_handle() {
    let (fake, vault) = unsealed().await;

    let (_, mut backend) = vault.secret().mount("consul", None, None).await.unwrap();
    vault
        .write("/consul/roles/ops", Some(json!({ "policy": "cmVhZA==" })))
        .await
        .unwrap();

    backend.remount("newpath").await.unwrap();
    assert_eq!(backend.name(), "newpath");
    assert!(fake.mount_names().contains(&"newpath".to_string()));
    assert!(!fake.mount_names().contains(&"consul".to_string()));
    assert_eq!(fake.secret("newpath/roles/ops"), Some(json!({ "policy": "cmVhZA==" })));

    let err = vault.secret().remount("consul", "elsewhere").await.unwrap_err();
    assert!(matches!(err, VaultError::Mount(ref m) if m.operation == "remount"));
}

#[tokio::test]
async fn test_unmount() {
    let (fake, vault) = unsealed().await;

    vault.secret().mount("transit", None, None).await.unwrap();
    assert!(vault.secret().unmount("transit").await.unwrap());
    assert!(!fake.mount_names().contains(&"transit".to_string()));

    let err = vault.secret().unmount("transit").await.unwrap_err();
    assert!(matches!(err, VaultError::Mount(_)));
}

#[tokio::test]
async fn test_generic_secret_crud() {
    let (_fake, vault) = unsealed().await;
    let backend = vault.secret().load("secret", Some("generic")).unwrap();

    assert!(matches!(backend.read("app/db").await, Err(VaultError::NotFound(_))));
    assert!(backend.list("").await.unwrap().is_empty());

    backend
        .write("app/db", json!({ "user": "dev", "password": "hunter2", "unused": null }))
        .await
        .unwrap();
    backend.write("app/cache", json!({ "ttl": 30 })).await.unwrap();
    backend.write("top", json!({ "value": 1 })).await.unwrap();

    let secret = backend.read("app/db").await.unwrap();
    assert_eq!(secret, json!({ "user": "dev", "password": "hunter2" }));
    assert_eq!(secret.get("user"), Some(&json!("dev")));
    assert!(!format!("{secret:?}").contains("hunter2"));

    assert_eq!(backend.list("").await.unwrap(), ["app/", "top"]);
    assert_eq!(backend.list("app").await.unwrap(), ["cache", "db"]);

    assert!(backend.delete("app/db").await.unwrap());
    assert!(matches!(backend.read("app/db").await, Err(VaultError::NotFound(_))));

    let err = backend.write("scalar", json!("not an object")).await.unwrap_err();
    assert!(matches!(err, VaultError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_pass_through_read() {
    let (_fake, vault) = unsealed().await;
    vault.write("secret/passthrough", Some(json!({ "a": 1 }))).await.unwrap();

    let response = vault.read("secret/passthrough").await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.value().unwrap()["data"], json!({ "a": 1 }));

    assert!(vault.delete("secret/passthrough").await.unwrap().is_no_content());
    let err = vault.read("secret/passthrough").await.unwrap_err();
    assert!(err.is_http(HttpErrorKind::InvalidPath));
}

#[tokio::test]
async fn test_typed_views_follow_kind() {
    let (_fake, vault) = unsealed().await;
    let generic = vault.secret().load("secret", Some("generic")).unwrap();

    assert!(matches!(generic.aws(), Err(VaultError::Unsupported { .. })));
    assert!(matches!(generic.creds("ro").await, Err(VaultError::Unsupported { .. })));

    let Backend::Secret(transit) = vault.load_backend("transit", "transit").unwrap() else {
        panic!("transit is a secret backend");
    };
    assert!(transit.transit().is_ok());
}

#[tokio::test]
async fn test_policy_round_trip() {
    let (fake, vault) = unsealed().await;

    let mut policy = Policy::new("dev");
    policy.insert("secret/*", Rule::policy("write"));
    policy.insert("sys/*", "deny");
    assert!(vault.policy().write(&policy).await.unwrap());

    let stored = fake.policy_document("dev").unwrap();
    assert_eq!(Policy::parse_document(&stored).len(), 2);

    let read = vault.policy().read("dev").await.unwrap();
    assert_eq!(read, policy);
    assert_eq!(read.get("sys/*").and_then(Rule::level), Some("deny"));

    let names = vault.policy().items().await.unwrap();
    assert!(names.contains(&"dev".to_string()));
    assert!(names.contains(&"root".to_string()));

    assert!(vault.policy().delete("dev").await.unwrap());
    assert!(matches!(vault.policy().read("dev").await, Err(VaultError::NotFound(_))));
}

#[tokio::test]
async fn test_policy_update() {
    let (_fake, vault) = unsealed().await;

    let created = vault
        .policy()
        .update("ops", |p| {
            p.insert("secret/ops/*", "read");
        })
        .await
        .unwrap();
    assert_eq!(created.len(), 1);

    let updated = vault
        .policy()
        .update("ops", |p| {
            p.insert("sys/leader", "read");
        })
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert_eq!(vault.policy().read("ops").await.unwrap(), updated);
}

#[tokio::test]
async fn test_audit_devices() {
    let (_fake, vault) = unsealed().await;

    let options = AuditOptions::file("/var/log/vault_audit.log").with_log_raw(true);
    assert!(vault.audit().enable("file", &options, Some("main log")).await.unwrap());

    let devices = vault.audit().items().await.unwrap();
    let device = devices.get("file").unwrap();
    assert_eq!(device.kind, "file");
    assert_eq!(device.description, "main log");
    assert_eq!(device.settings["path"], "/var/log/vault_audit.log");
    assert_eq!(device.settings["log_raw"], "true");

    let err = vault.audit().enable("file", &options, None).await.unwrap_err();
    assert!(err.is_http(HttpErrorKind::InvalidRequest));

    assert!(vault.audit().disable("file").await.unwrap());
    assert!(vault.audit().items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_raw_storage() {
    let (_fake, vault) = unsealed().await;

    assert!(matches!(vault.raw().read("core/x").await, Err(VaultError::NotFound(_))));

    vault.raw().write("core/json", &json!({ "a": [1, 2] })).await.unwrap();
    assert_eq!(vault.raw().read("core/json").await.unwrap(), json!({ "a": [1, 2] }));

    vault.raw().write("core/text", &json!("plain")).await.unwrap();
    assert_eq!(vault.raw().read("core/text").await.unwrap(), json!("plain"));

    // Strings that look like other JSON values stay strings.
    for text in ["123", "true", "null", "[1]"] {
        vault.raw().write("core/lookalike", &json!(text)).await.unwrap();
        assert_eq!(vault.raw().read("core/lookalike").await.unwrap(), json!(text));
    }

    assert!(vault.raw().delete("core/json").await.unwrap());
}

#[tokio::test]
async fn test_lease_operations() {
    let (_fake, vault) = unsealed().await;

    let lease = vault.lease().renew("aws/creds/deploy/abc", Some(600)).await.unwrap();
    assert_eq!(lease.lease_id, "aws/creds/deploy/abc");
    assert_eq!(lease.lease_duration, 600);
    assert!(lease.renewable);

    assert!(vault.lease().revoke("aws/creds/deploy/abc").await.unwrap());
    assert!(vault.lease().revoke_prefix("aws/creds").await.unwrap());
}

#[tokio::test]
async fn test_token_store() {
    let (fake, vault) = unsealed().await;
    let store = vault.auth().token();

    let own = store.lookup_self().await.unwrap();
    assert_eq!(Some(own.id().to_string()), fake.root_token());
    assert!(!own.is_login());

    let created = store
        .create(&TokenRequest::new().with_policies(["dev"]).with_lease("1h"))
        .await
        .unwrap();
    assert!(created.is_login());
    assert_eq!(created.policies(), ["dev"]);

    let looked_up = store.lookup(created.id()).await.unwrap();
    assert_eq!(looked_up.id(), created.id());

    let renewed = store.renew(created.id(), Some(60)).await.unwrap();
    assert_eq!(renewed.id(), created.id());

    assert!(store.revoke(created.id()).await.unwrap());
    assert!(matches!(store.lookup(created.id()).await, Err(VaultError::NotFound(_))));
}

#[tokio::test]
async fn test_userpass_login() {
    let (_fake, vault) = unsealed().await;

    let backend = vault.auth().enable("userpass", None, Some("people")).await.unwrap();
    backend
        .userpass()
        .unwrap()
        .create_user("armon", "s3cret", ["dev", "ops"])
        .await
        .unwrap();

    let token = vault
        .auth()
        .login("userpass", None, &LoginCredentials::userpass("armon", "s3cret"))
        .await
        .unwrap();
    assert!(token.is_login());
    assert_eq!(token.policies(), ["dev", "ops"]);

    let listed = vault.auth().items().await.unwrap();
    assert!(listed.contains("userpass"));
    assert!(listed.contains("token"));
}

#[tokio::test]
async fn test_rejected_login_is_login_error() {
    let (_fake, vault) = unsealed().await;
    vault.auth().enable("userpass", None, None).await.unwrap();

    let err = vault
        .auth()
        .login("userpass", None, &LoginCredentials::userpass("armon", "wrong"))
        .await
        .unwrap_err();
    let VaultError::Login(login) = err else {
        panic!("expected a login error, got {err:?}");
    };
    assert_eq!(login.mount, "userpass");
    assert_eq!(login.status, 400);
    assert_eq!(login.errors, ["invalid username or password"]);
}

#[tokio::test]
async fn test_disable_token_backend_is_mount_error() {
    let (_fake, vault) = unsealed().await;
    let err = vault.auth().disable("token").await.unwrap_err();
    assert!(matches!(err, VaultError::Mount(ref m) if m.operation == "disable"));
}
