//! Attestation client against a stand-in Attestation Service.

use chrono::Utc;
use spartan_client::{AttestationClient, CacheRecord, ClientError, FetchOptions, TokenCache};
use spartan_core::{AUTH_HEADER, AttestationConfig, RoleToken, SELF_ISSUER, TokenType};
use spartan_token::{KeyPair, Payload, PublicKey, SignOptions, VerifyOptions, sign, verify};
use tempfile::TempDir;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP_PRIVATE: &str = include_str!("../../../testdata/app-es256-private.pem");
const APP_PUBLIC: &str = include_str!("../../../testdata/app-es256-public.pem");
const AS_PRIVATE: &str = include_str!("../../../testdata/as-es256-private.pem");
const AS_PUBLIC: &str = include_str!("../../../testdata/as-es256-public.pem");

const TOKENS_PATH: &str = "/v1/as/tokens";

fn app_keys() -> KeyPair {
    KeyPair::from_pem(APP_PRIVATE, APP_PUBLIC).unwrap()
}

fn as_keys() -> KeyPair {
    KeyPair::from_pem(AS_PRIVATE, AS_PUBLIC).unwrap()
}

/// A role credential for the test application, as the AS would mint it.
fn credential(role: &str, issued_at: i64, ttl: u64) -> String {
    sign(
        &Payload::as_app_token(role, Some("127.0.0.1".to_string())),
        &as_keys(),
        &SignOptions::new(app_keys().subject(), "spartan-domain")
            .expires_in(ttl)
            .issued_at(issued_at),
    )
    .unwrap()
}

fn client_for(server: &MockServer, cache_dir: &TempDir) -> AttestationClient {
    let config = AttestationConfig::new(format!("{}{}", server.uri(), TOKENS_PATH), cache_dir.path());
    AttestationClient::new(config, app_keys()).unwrap()
}

fn token_body(entries: &[(&str, &str)]) -> serde_json::Value {
    let tokens: Vec<_> = entries
        .iter()
        .map(|(role, astoken)| serde_json::json!({ "role": role, "astoken": astoken }))
        .collect();
    serde_json::json!({ "tokens": tokens })
}

#[tokio::test]
async fn test_cache_miss_performs_round_trip_and_persists() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let astoken = credential("SuperRole", Utc::now().timestamp(), 3600);

    Mock::given(method("GET"))
        .and(path(TOKENS_PATH))
        .and(header_exists(AUTH_HEADER))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(&[("SuperRole", astoken.as_str())])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let envelope = client
        .fetch("SuperRole", &FetchOptions::default())
        .await
        .unwrap();

    // Envelope is self-signed by the application and wraps the AS answer
    let app_public = PublicKey::from_pem(APP_PUBLIC).unwrap();
    let outer = verify(&envelope, &app_public, &VerifyOptions::default()).unwrap();
    assert_eq!(outer.token_type(), Some(TokenType::AppSvcReq));
    assert_eq!(outer.iss, SELF_ISSUER);
    assert_eq!(outer.sub, client.subject());
    assert_eq!(outer.payload.astoken.as_deref(), Some(astoken.as_str()));
    assert_eq!(outer.payload.pubkey.as_deref(), Some(APP_PUBLIC));
    assert_eq!(outer.exp - outer.iat.unwrap(), 60);

    let record = TokenCache::new(cache_dir.path()).load().await.unwrap().unwrap();
    assert_eq!(
        record.tokens,
        vec![RoleToken {
            role: "SuperRole".to_string(),
            astoken: astoken.clone(),
        }]
    );
}

#[tokio::test]
async fn test_as_request_is_a_signed_attestation_request() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let astoken = credential("SuperRole", Utc::now().timestamp(), 3600);

    Mock::given(method("GET"))
        .and(path(TOKENS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(&[("SuperRole", astoken.as_str())])),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let envelope = client
        .fetch("SuperRole", &FetchOptions::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let header = requests[0].headers.get(AUTH_HEADER).unwrap();
    let request_token = header.to_str().unwrap();

    let app_public = PublicKey::from_pem(APP_PUBLIC).unwrap();
    let request = verify(request_token, &app_public, &VerifyOptions::default()).unwrap();
    assert_eq!(request.token_type(), Some(TokenType::AsAppReq));
    assert_eq!(request.sub, client.subject());
    assert_eq!(request.payload.pubkey.as_deref(), Some(APP_PUBLIC));

    // Request and envelope carry different nonces
    let outer = verify(&envelope, &app_public, &VerifyOptions::default()).unwrap();
    assert!(request.payload.nonce.is_some());
    assert_ne!(request.payload.nonce, outer.payload.nonce);
}

#[tokio::test]
async fn test_second_fetch_uses_cache() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let astoken = credential("SuperRole", Utc::now().timestamp(), 3600);

    Mock::given(method("GET"))
        .and(path(TOKENS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(&[("SuperRole", astoken.as_str())])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let first = client.fetch("SuperRole", &FetchOptions::default()).await.unwrap();
    let second = client.fetch("SuperRole", &FetchOptions::default()).await.unwrap();

    // Fresh envelope each time, same nested credential
    assert_ne!(first, second);
    let app_public = PublicKey::from_pem(APP_PUBLIC).unwrap();
    let outer = verify(&second, &app_public, &VerifyOptions::default()).unwrap();
    assert_eq!(outer.payload.astoken.as_deref(), Some(astoken.as_str()));

    // MockServer verifies `.expect(1)` on drop
}

#[tokio::test]
async fn test_prepopulated_cache_avoids_network() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let astoken = credential("SuperRole", Utc::now().timestamp(), 3600);

    TokenCache::new(cache_dir.path())
        .store(vec![RoleToken {
            role: "SuperRole".to_string(),
            astoken: astoken.clone(),
        }])
        .await
        .unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let raw = client
        .fetch("SuperRole", &FetchOptions::credential())
        .await
        .unwrap();
    assert_eq!(raw, astoken);
}

#[tokio::test]
async fn test_expired_cache_entry_triggers_refresh() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let now = Utc::now().timestamp();
    let stale = credential("SuperRole", now - 7200, 3600);
    let fresh = credential("SuperRole", now, 3600);

    let record = CacheRecord {
        updated_at: now,
        tokens: vec![RoleToken {
            role: "SuperRole".to_string(),
            astoken: stale,
        }],
    };
    std::fs::write(
        cache_dir.path().join("tokens"),
        serde_json::to_vec(&record).unwrap(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path(TOKENS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(&[("SuperRole", fresh.as_str())])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let raw = client
        .fetch("SuperRole", &FetchOptions::credential())
        .await
        .unwrap();
    assert_eq!(raw, fresh);
}

#[tokio::test]
async fn test_corrupt_cache_is_a_miss() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let astoken = credential("SuperRole", Utc::now().timestamp(), 3600);
    std::fs::write(cache_dir.path().join("tokens"), "not json").unwrap();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(&[("SuperRole", astoken.as_str())])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let raw = client
        .fetch("SuperRole", &FetchOptions::credential())
        .await
        .unwrap();
    assert_eq!(raw, astoken);
}

#[tokio::test]
async fn test_role_not_granted() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let astoken = credential("OtherRole", Utc::now().timestamp(), 3600);

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(&[("OtherRole", astoken.as_str())])),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let err = client
        .fetch("SuperRole", &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotAuthorized { ref role } if role == "SuperRole"));

    // Credentials for other roles are still cached
    let record = TokenCache::new(cache_dir.path()).load().await.unwrap().unwrap();
    assert!(record.fresh_token("OtherRole", Utc::now().timestamp()).is_some());
}

#[tokio::test]
async fn test_non_success_status_is_reported() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("{\"msg\":\"no token\"}"))
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let err = client
        .fetch("SuperRole", &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_transport());
    match err {
        ClientError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("no token"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_response_body() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, &cache_dir);
    let err = client
        .fetch("SuperRole", &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let cache_dir = TempDir::new().unwrap();
    // Nothing listens on the discard port
    let mut config = AttestationConfig::new("http://127.0.0.1:9/v1/as/tokens", cache_dir.path());
    config.timeout_secs = Some(5);
    let client = AttestationClient::new(config, app_keys()).unwrap();

    let err = client
        .fetch("SuperRole", &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
