//! End-to-end flows through the public client against the in-memory server.

use proptest::prelude::*;
use secrecy::ExposeSecret;
use serde_json::json;
use test_utils::{FakeVault, shamir_strategy};
use vault_client::v1::{LoginCredentials, SecretKind};
use vault_client::{Policy, Rule, Vault, VaultConfig, VaultError};

async fn connect(fake: &FakeVault) -> Vault {
    test_utils::init_test_tracing();
    Vault::new(&VaultConfig::new(fake.uri())).unwrap()
}

/// Initialize 5/3, unseal with two shares, then the third.
#[tokio::test]
async fn test_bootstrap_flow() {
    let fake = FakeVault::start().await;
    let vault = connect(&fake).await;

    assert!(!vault.sys().status().await.unwrap().initialized);
    let init = vault.initialize(5, 3).await.unwrap();
    assert_eq!(init.keys().len(), 5);
    assert_eq!(
        vault.token().await.map(|t| t.expose_secret().to_string()),
        fake.root_token()
    );

    let status = vault.seal().unseal(&init.keys()[..2]).await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 2);

    let status = vault.seal().unseal_key(&init.keys()[2]).await.unwrap();
    assert!(!status.sealed);

    let health = vault.sys().health().await.unwrap();
    assert!(health.initialized && !health.sealed);
}

/// Mount consul, store a role, move the mount, read the role back.
#[tokio::test]
async fn test_mount_and_remount_flow() {
    let fake = FakeVault::start_unsealed().await;
    let vault = connect(&fake).await;
    vault.set_token(fake.root_token().unwrap()).await;

    let (_, mut consul) = vault.secret().mount("consul", None, None).await.unwrap();
    consul
        .consul()
        .unwrap()
        .write_role("ops", "key \"\" { policy = \"read\" }")
        .await
        .unwrap();

    consul.remount("newpath").await.unwrap();
    assert_eq!(consul.name(), "newpath");

    let mounts = vault.secret().items().await.unwrap();
    assert!(!mounts.contains("consul"));
    let moved = mounts.get("newpath").unwrap();
    assert_eq!(moved.kind(), &SecretKind::Consul);

    let role = moved.consul().unwrap().read_role("ops").await.unwrap();
    assert!(role.contains_key("policy"));
}

/// Write a policy, read it back, grant it through a userpass login.
#[tokio::test]
async fn test_policy_and_login_flow() {
    let fake = FakeVault::start_unsealed().await;
    let vault = connect(&fake).await;
    vault.set_token(fake.root_token().unwrap()).await;

    let policy = Policy::with_rules("app", [("secret/app/*", Rule::policy("read"))]);
    vault.policy().write(&policy).await.unwrap();
    assert_eq!(vault.policy().read("app").await.unwrap(), policy);

    let backend = vault.auth().enable("userpass", None, None).await.unwrap();
    backend
        .userpass()
        .unwrap()
        .create_user("svc", "pw", ["app"])
        .await
        .unwrap();

    let token = backend
        .login(&LoginCredentials::userpass("svc", "pw"))
        .await
        .unwrap();
    assert_eq!(token.policies(), ["app"]);

    // Switching identity affects every endpoint of the client.
    vault.set_token(token.id()).await;
    let own = vault.auth().token().lookup_self().await.unwrap();
    assert_eq!(own.id(), token.id());

    let err = backend
        .login(&LoginCredentials::github("gh-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Unsupported { .. }));
}

/// Seal an unsealed server and observe it.
#[tokio::test]
async fn test_seal_flow() {
    let fake = FakeVault::start_unsealed().await;
    let vault = connect(&fake).await;
    vault.set_token(fake.root_token().unwrap()).await;

    assert!(!vault.seal().status().await.unwrap().sealed);
    vault.seal().seal().await.unwrap();
    let status = vault.seal().status().await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 0);
    assert!(fake.is_sealed());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// *For any* valid share configuration, submitting every share unseals the
    /// server after exactly `threshold` submissions.
    #[test]
    fn prop_unseal_uses_threshold_shares((threshold, shares) in shamir_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (calls, sealed) = runtime.block_on(async {
            let fake = FakeVault::start().await;
            let vault = Vault::connect(fake.uri()).unwrap();
            let init = vault.initialize(shares, threshold).await.unwrap();
            let status = vault.seal().unseal(init.keys()).await.unwrap();
            (fake.unseal_calls(), status.sealed)
        });

        prop_assert!(!sealed);
        prop_assert_eq!(calls, threshold as usize);
    }
}

#[tokio::test]
async fn test_pass_through_generic_storage() {
    let fake = FakeVault::start_unsealed().await;
    let vault = connect(&fake).await;
    vault.set_token(fake.root_token().unwrap()).await;

    vault
        .write("secret/shared/config", Some(json!({ "region": "eu-west-1" })))
        .await
        .unwrap();
    let secret = vault.secret().load("secret", Some("generic")).unwrap();
    let value = secret.read("shared/config").await.unwrap();
    assert_eq!(value, json!({ "region": "eu-west-1" }));
}
