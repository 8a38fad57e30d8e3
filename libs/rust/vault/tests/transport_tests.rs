//! Transport tests against single mocked routes.

use serde_json::json;
use test_utils::fixtures;
use vault_client::{CredentialCarrier, HttpErrorKind, Transport, VaultConfig, VaultError};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn transport(server: &MockServer) -> Transport {
    test_utils::init_test_tracing();
    Transport::new(&VaultConfig::new(server.uri())).unwrap()
}

#[tokio::test]
async fn test_top_level_nulls_are_stripped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/secret/app"))
        .and(body_json(json!({ "user": "dev", "nested": { "kept": null } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport(&server).await;
    let response = transport
        .post(
            "/secret/app",
            Some(json!({ "user": "dev", "password": null, "nested": { "kept": null } })),
        )
        .await
        .unwrap();

    assert!(response.ok());
    assert!(response.is_no_content());
}

#[tokio::test]
async fn test_all_null_body_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/seal"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let transport = transport(&server).await;
    transport.put("sys/seal", Some(json!({ "reason": null }))).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].body.is_empty());
    assert!(!requests[0].headers.contains_key("content-type"));
}

#[tokio::test]
async fn test_credential_sent_as_header_and_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/init"))
        .and(header("X-Vault-Token", "s.root"))
        .and(header("cookie", "token=s.root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "initialized": true })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport(&server).await;
    transport.set_credential("s.root").await;
    transport.get("/sys/init").await.unwrap();
}

#[tokio::test]
async fn test_header_only_carrier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "initialized": true })))
        .mount(&server)
        .await;

    let config = VaultConfig::new(server.uri())
        .with_token("s.root")
        .with_credential_carrier(CredentialCarrier::Header);
    let transport = Transport::new(&config).unwrap();
    transport.get("/sys/init").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("x-vault-token").unwrap(), "s.root");
    assert!(!requests[0].headers.contains_key("cookie"));
}

#[tokio::test]
async fn test_cleared_credential_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "initialized": false })))
        .mount(&server)
        .await;

    let transport = transport(&server).await;
    transport.set_credential("s.root").await;
    transport.clear_credential().await;
    transport.get("/sys/init").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("x-vault-token"));
}

#[tokio::test]
async fn test_status_classification() {
    let cases = [
        (400, HttpErrorKind::InvalidRequest),
        (401, HttpErrorKind::Unauthorized),
        (403, HttpErrorKind::Forbidden),
        (404, HttpErrorKind::InvalidPath),
        (429, HttpErrorKind::RateLimited),
        (500, HttpErrorKind::InternalError),
        (503, HttpErrorKind::Unavailable),
        (202, HttpErrorKind::Other),
    ];

    for (status, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_json(fixtures::errors(&["boom"])))
            .mount(&server)
            .await;

        let err = transport(&server).await.get("/sys/leader").await.unwrap_err();
        let http = err.http().unwrap();
        assert_eq!(http.status, status);
        assert_eq!(http.kind, kind, "status {status}");
        assert_eq!(http.errors(), ["boom"]);
    }
}

#[tokio::test]
async fn test_text_error_body_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = transport(&server).await.get("/sys/leader").await.unwrap_err();
    let http = err.http().unwrap();
    assert_eq!(http.errors(), ["upstream exploded"]);
    assert_eq!(http.payload.body, json!("upstream exploded"));
}

#[tokio::test]
async fn test_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .and(query_param("standbycode", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    transport(&server)
        .await
        .get_with("/sys/health", json!({ "standbycode": 200, "skipped": null }))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].url.query().unwrap_or_default().contains("skipped"));
}

#[tokio::test]
async fn test_list_uses_list_verb() {
    let server = MockServer::start().await;
    Mock::given(method("LIST"))
        .and(path("/v1/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::key_list(&["a", "b/"])))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport(&server).await.list("secret").await.unwrap().value().unwrap();
    assert_eq!(body["data"]["keys"], json!(["a", "b/"]));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let transport = Transport::new(&VaultConfig::new("http://127.0.0.1:9")).unwrap();
    let err = transport.get("/sys/init").await.unwrap_err();
    assert!(matches!(err, VaultError::Transport(_)));
    assert!(err.is_retryable());
}
