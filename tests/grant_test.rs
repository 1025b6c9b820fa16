//! Grant strategy integration tests using wiremock
//!
//! Drives the client-credentials and system-user grants against a stub
//! server in both tenant addressing modes.

mod common;

use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idmctl::auth::grant::basic_auth;
use idmctl::auth::{token_service, EndpointPaths, Grant};
use idmctl::commands::session_for;
use idmctl::config::Settings;
use idmctl::error::IdmError;
use idmctl::target::{AddressingMode, Target};

use common::{api_context, headless_slot};

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "access-123",
        "token_type": "Bearer",
        "refresh_token": "refresh-456",
        "expires_in": 3600,
        "scope": "admin"
    })
}

fn client_credentials() -> Grant {
    Grant::ClientCredentials {
        client_id: "cli-client".to_string(),
        client_secret: "s3cret".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Client credentials
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_client_credentials_tenant_in_host() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SAAS/auth/oauthtoken"))
        .and(header(
            "authorization",
            basic_auth("cli-client", "s3cret").as_str(),
        ))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(header("accept", "application/json"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = api_context(&server.uri());
    let bundle = token_service(AddressingMode::TenantInHost)
        .acquire(&ctx, &client_credentials(), &headless_slot())
        .await
        .unwrap();

    assert_eq!(bundle.authorization(), "Bearer access-123");
    assert_eq!(bundle.refresh_token.as_deref(), Some("refresh-456"));
    assert_eq!(bundle.expires_in, Some(3600));
}

#[tokio::test]
async fn test_client_credentials_tenant_in_path_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SAAS/t/tenant1/auth/oauthtoken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/SAAS/t/tenant1/jersey/manager/api/users"))
        .and(header("authorization", "Bearer access-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut target = Target::new(&format!("{}/SAAS/t/tenant1", server.uri()), false);
    assert_eq!(target.mode, AddressingMode::TenantInPath);

    let settings = Settings::default();
    let ctx = session_for(&settings, &target).unwrap();
    let bundle = token_service(target.mode)
        .acquire(&ctx, &client_credentials(), &headless_slot())
        .await
        .unwrap();
    target.store_tokens(&bundle);
    assert!(target.expires_at.is_some());

    let ctx = session_for(&settings, &target).unwrap().accept("json");
    let users: serde_json::Value = ctx
        .request(reqwest::Method::GET, "users", Default::default())
        .await
        .unwrap();
    assert_eq!(users["items"], json!([]));
}

#[tokio::test]
async fn test_client_credentials_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EndpointPaths::for_mode(AddressingMode::TenantInHost).token))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
        )
        .mount(&server)
        .await;

    let ctx = api_context(&server.uri());
    let err = token_service(AddressingMode::TenantInHost)
        .acquire(&ctx, &client_credentials(), &headless_slot())
        .await
        .unwrap_err();

    match err.downcast_ref::<IdmError>() {
        Some(IdmError::Status { status, body }) => {
            assert_eq!(status, "401 Unauthorized");
            assert!(body.contains("invalid_client"), "{body}");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_response_without_access_token_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SAAS/auth/oauthtoken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&server)
        .await;

    let ctx = api_context(&server.uri());
    let err = token_service(AddressingMode::TenantInHost)
        .acquire(&ctx, &client_credentials(), &headless_slot())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IdmError>(),
        Some(IdmError::InvalidResponse(_))
    ));
}

// ---------------------------------------------------------------------------
// System user
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_system_user_login() {
    let server = MockServer::start().await;
    // a stale token on the context must not reach the login endpoint
    Mock::given(method("POST"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/SAAS/API/1.0/REST/auth/system/login"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "username": "admin",
            "password": "pw",
            "issueToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionToken": "sess-1",
            "admin": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = api_context(&server.uri()).authorization("Bearer stale");
    let grant = Grant::SystemUser {
        username: "admin".to_string(),
        password: "pw".to_string(),
    };
    let bundle = token_service(AddressingMode::TenantInHost)
        .acquire(&ctx, &grant, &headless_slot())
        .await
        .unwrap();

    assert_eq!(bundle.token_type, "HZN");
    assert_eq!(bundle.authorization(), "HZN sess-1");
}

#[tokio::test]
async fn test_system_user_tenant_in_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SAAS/t/acme/API/1.0/REST/auth/system/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionToken": "S"})))
        .expect(1)
        .mount(&server)
        .await;

    let target = Target::new(&format!("{}/SAAS/t/acme", server.uri()), false);
    let ctx = session_for(&Settings::default(), &target).unwrap();
    let grant = Grant::SystemUser {
        username: "admin".to_string(),
        password: "pw".to_string(),
    };
    let bundle = token_service(target.mode)
        .acquire(&ctx, &grant, &headless_slot())
        .await
        .unwrap();
    assert_eq!(bundle.access_token, "S");
}

#[tokio::test]
async fn test_system_user_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authentication failed"))
        .mount(&server)
        .await;

    let ctx = api_context(&server.uri());
    let grant = Grant::SystemUser {
        username: "admin".to_string(),
        password: "wrong".to_string(),
    };
    let err = token_service(AddressingMode::TenantInHost)
        .acquire(&ctx, &grant, &headless_slot())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "401 Unauthorized\nAuthentication failed");
}
