//! Token reuse, refresh and the Gmail connector against a mock server.

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docsafe::email::{OAuthClient, StoredToken, TokenStore};
use docsafe::{CredentialProvider, GmailConnector, MailConnector, MailError, MailService};

const ACCOUNT: &str = "me@example.com";

fn provider(server: &MockServer, dir: &TempDir) -> CredentialProvider {
    let oauth = OAuthClient::new(
        format!("{}/auth", server.uri()),
        format!("{}/token", server.uri()),
        "client-1",
        SecretString::from("secret-1".to_string()),
    )
    .unwrap();
    CredentialProvider::new(oauth, TokenStore::new(dir.path().join("tokens")))
}

fn token(access: &str, refresh: Option<&str>, expires_in_secs: i64) -> StoredToken {
    StoredToken {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        scope: None,
        token_type: Some("Bearer".to_string()),
    }
}

#[tokio::test]
async fn test_valid_token_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = provider(&server, &dir);
    credentials
        .store()
        .save(ACCOUNT, &token("at-valid", Some("rt"), 3600))
        .await
        .unwrap();

    let access = credentials.get_token(ACCOUNT).await.unwrap();
    assert_eq!(access.expose_secret(), "at-valid");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_saved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-keep"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-fresh",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = provider(&server, &dir);
    credentials
        .store()
        .save(ACCOUNT, &token("at-old", Some("rt-keep"), -10))
        .await
        .unwrap();

    let access = credentials.get_token(ACCOUNT).await.unwrap();
    assert_eq!(access.expose_secret(), "at-fresh");

    let saved = credentials.store().load(ACCOUNT).await.unwrap();
    assert_eq!(saved.access_token, "at-fresh");
    assert_eq!(saved.refresh_token.as_deref(), Some("rt-keep"));
    assert!(!saved.is_expired(Utc::now()));
}

#[tokio::test]
async fn test_refresh_rejected_by_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = provider(&server, &dir);
    credentials
        .store()
        .save(ACCOUNT, &token("at-old", Some("rt-revoked"), -10))
        .await
        .unwrap();

    let err = credentials.get_token(ACCOUNT).await.unwrap_err();
    match err {
        MailError::OAuth2Error(message) => assert!(message.contains("invalid_grant"), "{}", message),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_connector_uses_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(header("authorization", "Bearer at-valid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"id": "m1", "threadId": "t1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = provider(&server, &dir);
    credentials
        .store()
        .save(ACCOUNT, &token("at-valid", None, 3600))
        .await
        .unwrap();

    let connector = GmailConnector::new(credentials, format!("{}/gmail/v1", server.uri()));
    let service = connector.connect(ACCOUNT).await.unwrap();
    let refs = service.list_messages("has:attachment", 10).await.unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].id, "m1");
}
