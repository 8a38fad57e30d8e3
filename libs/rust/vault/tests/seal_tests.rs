//! Initialization and the seal/unseal state machine.

use secrecy::ExposeSecret;
use serde_json::json;
use test_utils::{FakeVault, fixtures};
use vault_client::v1::SealState;
use vault_client::{HttpErrorKind, KeyShare, Vault, VaultError};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn initialized(shares: u32, threshold: u32) -> (FakeVault, Vault, Vec<KeyShare>) {
    test_utils::init_test_tracing();
    let fake = FakeVault::start().await;
    let vault = Vault::connect(fake.uri()).unwrap();
    let init = vault.initialize(shares, threshold).await.unwrap();
    (fake, vault, init.into_keys())
}

#[tokio::test]
async fn test_initialize_adopts_root_token() {
    let (fake, vault, keys) = initialized(5, 3).await;

    assert_eq!(keys.len(), 5);
    let token = vault.token().await.unwrap();
    assert_eq!(Some(token.expose_secret().to_string()), fake.root_token());
    assert!(vault.sys().status().await.unwrap().initialized);
}

#[tokio::test]
async fn test_initialize_twice_is_invalid_request() {
    let (_fake, vault, _) = initialized(1, 1).await;
    let err = vault.initialize(1, 1).await.unwrap_err();
    assert!(err.is_http(HttpErrorKind::InvalidRequest));
}

#[tokio::test]
async fn test_unseal_below_threshold_reports_progress() {
    let (fake, vault, keys) = initialized(5, 3).await;

    let status = vault.seal().unseal(&keys[..2]).await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 2);
    assert_eq!(status.threshold, 3);
    assert_eq!(status.shares, 5);
    assert_eq!(status.remaining(), 1);
    assert!(fake.is_sealed());

    let status = vault.seal().unseal_key(&keys[2]).await.unwrap();
    assert!(!status.sealed);
    assert_eq!(status.remaining(), 0);
    assert!(!fake.is_sealed());
}

#[tokio::test]
async fn test_unseal_stops_at_threshold() {
    let (fake, vault, keys) = initialized(5, 3).await;

    let status = vault.seal().unseal(&keys).await.unwrap();
    assert!(!status.sealed);
    assert_eq!(fake.unseal_calls(), 3);
}

#[tokio::test]
async fn test_unseal_without_shares_reads_status() {
    let (fake, vault, _) = initialized(3, 2).await;

    let status = vault.seal().unseal(Vec::<KeyShare>::new()).await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 0);
    assert_eq!(fake.unseal_calls(), 0);
}

#[tokio::test]
async fn test_unseal_sends_exactly_threshold_requests() {
    let server = MockServer::start().await;
    for progress in 1..=3u32 {
        let key = format!("{progress:02x}").repeat(32);
        let sealed = progress < 3;
        Mock::given(method("PUT"))
            .and(path("/v1/sys/unseal"))
            .and(body_json(json!({ "key": key })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(fixtures::seal_status(sealed, 3, 5, if sealed { progress } else { 0 })),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    let unused = "ff".repeat(32);
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .and(body_json(json!({ "key": unused })))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let vault = Vault::connect(server.uri()).unwrap();
    let keys: Vec<String> = (1..=3u32)
        .map(|i| format!("{i:02x}").repeat(32))
        .chain([unused.clone()])
        .collect();
    let status = vault.seal().unseal(keys).await.unwrap();
    assert!(!status.sealed);
}

#[tokio::test]
async fn test_invalid_share_stops_unseal() {
    let (fake, vault, keys) = initialized(3, 2).await;

    let shares = vec![keys[0].clone(), KeyShare::new("not-a-share"), keys[1].clone()];
    let err = vault.seal().unseal(shares).await.unwrap_err();

    assert!(err.is_http(HttpErrorKind::InvalidRequest));
    assert_eq!(err.http().unwrap().errors(), ["invalid key"]);
    assert_eq!(fake.unseal_calls(), 2);
    assert!(fake.is_sealed());
}

#[tokio::test]
async fn test_reset_discards_progress() {
    let (_fake, vault, keys) = initialized(5, 3).await;

    vault.seal().unseal_key(&keys[0]).await.unwrap();
    let status = vault.seal().reset_unseal().await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 0);
}

#[tokio::test]
async fn test_unseal_session() {
    let (fake, vault, keys) = initialized(3, 2).await;
    let seal = vault.seal();
    let mut session = seal.begin_unseal().await.unwrap();

    assert_eq!(session.state(), SealState::Sealed { progress: 0 });
    assert_eq!(session.remaining(), 2);

    assert_eq!(
        session.submit(&keys[0]).await.unwrap(),
        SealState::Sealed { progress: 1 }
    );
    assert_eq!(session.submit(&keys[1]).await.unwrap(), SealState::Unsealed);
    assert!(session.is_complete());

    // Further shares are not sent once unsealed.
    assert_eq!(session.submit(&keys[2]).await.unwrap(), SealState::Unsealed);
    assert_eq!(session.submitted(), 2);
    assert_eq!(fake.unseal_calls(), 2);
}

#[tokio::test]
async fn test_seal_then_status() {
    let (_fake, vault, keys) = initialized(1, 1).await;
    vault.seal().unseal(&keys).await.unwrap();

    assert!(vault.seal().seal().await.unwrap());
    let status = vault.seal().status().await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 0);

    // Sealing a sealed server is a no-op.
    assert!(vault.seal().seal().await.unwrap());
}

#[tokio::test]
async fn test_seal_discards_partial_unseal() {
    let (_fake, vault, keys) = initialized(5, 3).await;

    let status = vault.seal().unseal(&keys[..2]).await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 2);

    assert!(vault.seal().seal().await.unwrap());
    let status = vault.seal().status().await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 0);
}

#[tokio::test]
async fn test_sealed_server_refuses_other_requests() {
    let (_fake, vault, _) = initialized(1, 1).await;

    let err = vault.secret().items().await.unwrap_err();
    assert!(err.is_http(HttpErrorKind::Unavailable));
    assert!(err.is_retryable());
    assert!(matches!(err, VaultError::Http(_)));
}

#[tokio::test]
async fn test_health_reports_sealed_node() {
    let (_fake, vault, _) = initialized(1, 1).await;
    let health = vault.sys().health().await.unwrap();
    assert!(health.initialized);
    assert!(health.sealed);
    assert!(!health.standby);

    let leader = vault.sys().leader().await.unwrap();
    assert!(!leader.enabled);
}
