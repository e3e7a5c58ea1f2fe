//! End-to-end grant lifecycle tests against the in-memory storage backend.

use chrono::Utc;
use docauth::oauth::{GrantConfig, GrantEngine, hash_password};
use docauth::oauth::types::*;
use docauth::storage::MemoryOAuthStorage;
use docauth::storage::traits::*;
use std::sync::Arc;

fn grant_config() -> GrantConfig {
    GrantConfig {
        token_type: "Bearer".to_string(),
        access_lifetime: chrono::Duration::hours(1),
        refresh_token_lifetime: Some(chrono::Duration::days(14)),
        auth_code_lifetime: chrono::Duration::seconds(30),
        always_issue_new_refresh_token: true,
        unset_refresh_token_after_use: true,
    }
}

fn engine_with(storage: Arc<MemoryOAuthStorage>, config: GrantConfig) -> GrantEngine {
    GrantEngine::new(storage, config)
}

async fn seed_client(storage: &MemoryOAuthStorage, client_id: &str, secret: Option<&str>) {
    storage
        .put_client(&Client {
            client_id: client_id.to_string(),
            client_secret: secret.map(|s| s.to_string()),
            redirect_uri: "https://example.com/cb".to_string(),
            grant_types: None,
            scope: Some("read write".to_string()),
            user_id: None,
        })
        .await
        .unwrap();
}

async fn seed_user(storage: &MemoryOAuthStorage, email: &str, password: &str) {
    storage
        .put_user(&User {
            email: email.to_string(),
            password: hash_password(password).unwrap(),
            first_name: None,
            last_name: None,
        })
        .await
        .unwrap();
}

fn token_request(grant_type: GrantType) -> TokenRequest {
    TokenRequest {
        grant_type,
        code: None,
        redirect_uri: None,
        refresh_token: None,
        username: None,
        password: None,
        client_id: None,
        client_secret: None,
        scope: None,
    }
}

fn client_auth(client_id: &str, secret: Option<&str>) -> Option<ClientAuthentication> {
    Some(ClientAuthentication {
        client_id: client_id.to_string(),
        client_secret: secret.map(|s| s.to_string()),
    })
}

#[tokio::test]
async fn test_authorization_code_exchange_is_single_use() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    let engine = engine_with(storage.clone(), grant_config());

    let code = engine
        .create_authorization_code("app", "alice@example.com", "https://example.com/cb", None, None)
        .await
        .unwrap();

    let mut request = token_request(GrantType::AuthorizationCode);
    request.code = Some(code.clone());
    request.redirect_uri = Some("https://example.com/cb".to_string());

    let response = engine
        .exchange(request.clone(), client_auth("app", Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(response.token_type, "Bearer");
    assert!(response.refresh_token.is_some());

    let stored = storage
        .get_access_token(&response.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_id.as_deref(), Some("alice@example.com"));

    // The code was consumed on the first exchange
    let replay = engine
        .exchange(request, client_auth("app", Some("s3cret")))
        .await;
    assert!(matches!(
        replay,
        Err(docauth::errors::OAuthError::InvalidGrant(_))
    ));
}

#[tokio::test]
async fn test_expired_authorization_code_rejected() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    storage
        .put_authorization_code(&AuthorizationCode {
            authorization_code: "deadbeef".to_string(),
            client_id: "app".to_string(),
            user_id: "alice@example.com".to_string(),
            redirect_uri: "https://example.com/cb".to_string(),
            expires: Utc::now() - chrono::Duration::seconds(1),
            scope: None,
            id_token: None,
        })
        .await
        .unwrap();
    let engine = engine_with(storage, grant_config());

    let mut request = token_request(GrantType::AuthorizationCode);
    request.code = Some("deadbeef".to_string());
    request.redirect_uri = Some("https://example.com/cb".to_string());

    let result = engine
        .exchange(request, client_auth("app", Some("s3cret")))
        .await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::InvalidGrant(_))
    ));
}

#[tokio::test]
async fn test_redirect_uri_mismatch_rejected() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    let engine = engine_with(storage.clone(), grant_config());

    let code = engine
        .create_authorization_code("app", "alice@example.com", "https://example.com/cb", None, None)
        .await
        .unwrap();

    let mut request = token_request(GrantType::AuthorizationCode);
    request.code = Some(code.clone());
    request.redirect_uri = Some("https://evil.example.com/cb".to_string());

    let result = engine
        .exchange(request, client_auth("app", Some("s3cret")))
        .await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::InvalidGrant(_))
    ));

    // A mismatch does not consume the code
    assert!(
        storage
            .get_authorization_code(&code)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_refresh_rotation_invalidates_old_tokens() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    seed_user(&storage, "alice@example.com", "hunter2!").await;
    let engine = engine_with(storage.clone(), grant_config());

    let mut request = token_request(GrantType::Password);
    request.username = Some("alice@example.com".to_string());
    request.password = Some("hunter2!".to_string());
    let first = engine
        .exchange(request, client_auth("app", Some("s3cret")))
        .await
        .unwrap();
    let old_access = first.access_token.clone();
    let old_refresh = first.refresh_token.clone().unwrap();

    let mut refresh = token_request(GrantType::RefreshToken);
    refresh.refresh_token = Some(old_refresh.clone());
    let second = engine
        .exchange(refresh.clone(), client_auth("app", Some("s3cret")))
        .await
        .unwrap();

    assert_ne!(second.access_token, old_access);
    let new_refresh = second.refresh_token.clone().unwrap();
    assert_ne!(new_refresh, old_refresh);

    // Both halves of the old pair are gone
    assert!(storage.get_access_token(&old_access).await.unwrap().is_none());
    assert!(
        storage
            .get_refresh_token(&old_refresh)
            .await
            .unwrap()
            .is_none()
    );

    // Replaying the rotated-out refresh token fails
    let replay = engine
        .exchange(refresh, client_auth("app", Some("s3cret")))
        .await;
    assert!(matches!(
        replay,
        Err(docauth::errors::OAuthError::InvalidGrant(_))
    ));
}

#[tokio::test]
async fn test_refresh_without_rotation_keeps_old_token() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    seed_user(&storage, "alice@example.com", "hunter2!").await;
    let config = GrantConfig {
        always_issue_new_refresh_token: false,
        unset_refresh_token_after_use: false,
        ..grant_config()
    };
    let engine = engine_with(storage.clone(), config);

    let mut request = token_request(GrantType::Password);
    request.username = Some("alice@example.com".to_string());
    request.password = Some("hunter2!".to_string());
    let first = engine
        .exchange(request, client_auth("app", Some("s3cret")))
        .await
        .unwrap();
    let refresh_token = first.refresh_token.clone().unwrap();

    let mut refresh = token_request(GrantType::RefreshToken);
    refresh.refresh_token = Some(refresh_token.clone());
    let second = engine
        .exchange(refresh.clone(), client_auth("app", Some("s3cret")))
        .await
        .unwrap();

    // The presented token survives and stays valid for another exchange
    assert!(second.refresh_token.is_none());
    assert!(
        storage
            .get_refresh_token(&refresh_token)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        engine
            .exchange(refresh, client_auth("app", Some("s3cret")))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_expired_refresh_token_rejected() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    storage
        .put_refresh_token(&RefreshToken {
            refresh_token: "stale".to_string(),
            client_id: "app".to_string(),
            user_id: Some("alice@example.com".to_string()),
            expires: Some(Utc::now() - chrono::Duration::days(1)),
            scope: None,
        })
        .await
        .unwrap();
    let engine = engine_with(storage, grant_config());

    let mut refresh = token_request(GrantType::RefreshToken);
    refresh.refresh_token = Some("stale".to_string());
    let result = engine
        .exchange(refresh, client_auth("app", Some("s3cret")))
        .await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::InvalidGrant(_))
    ));
}

#[tokio::test]
async fn test_single_live_access_token_per_subject() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    seed_user(&storage, "alice@example.com", "hunter2!").await;
    let engine = engine_with(storage.clone(), grant_config());

    let mut request = token_request(GrantType::Password);
    request.username = Some("alice@example.com".to_string());
    request.password = Some("hunter2!".to_string());

    let first = engine
        .exchange(request.clone(), client_auth("app", Some("s3cret")))
        .await
        .unwrap();
    let second = engine
        .exchange(request, client_auth("app", Some("s3cret")))
        .await
        .unwrap();

    // Repeated grants against the same subject reuse the live token
    assert_eq!(first.access_token, second.access_token);
    assert_eq!(first.refresh_token, second.refresh_token);
}

#[tokio::test]
async fn test_client_credentials_grant() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "service", Some("s3cret")).await;
    seed_client(&storage, "spa", None).await;
    let engine = engine_with(storage.clone(), grant_config());

    let response = engine
        .exchange(
            token_request(GrantType::ClientCredentials),
            client_auth("service", Some("s3cret")),
        )
        .await
        .unwrap();

    // Machine tokens carry no user and no refresh token
    assert!(response.refresh_token.is_none());
    let stored = storage
        .get_access_token(&response.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_id, None);

    // Public clients may not use the grant
    let result = engine
        .exchange(token_request(GrantType::ClientCredentials), client_auth("spa", None))
        .await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::InvalidClient(_))
    ));
}

#[tokio::test]
async fn test_grant_type_allow_list_enforced() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    storage
        .put_client(&Client {
            client_id: "restricted".to_string(),
            client_secret: Some("s3cret".to_string()),
            redirect_uri: "https://example.com/cb".to_string(),
            grant_types: Some("authorization_code refresh_token".to_string()),
            scope: None,
            user_id: None,
        })
        .await
        .unwrap();
    let engine = engine_with(storage, grant_config());

    let result = engine
        .exchange(
            token_request(GrantType::ClientCredentials),
            client_auth("restricted", Some("s3cret")),
        )
        .await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::UnsupportedGrantType(_))
    ));
}

#[tokio::test]
async fn test_wrong_client_secret_rejected() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    let engine = engine_with(storage, grant_config());

    let result = engine
        .exchange(
            token_request(GrantType::ClientCredentials),
            client_auth("app", Some("wrong")),
        )
        .await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::InvalidClient(_))
    ));
}

#[tokio::test]
async fn test_password_grant_normalizes_email() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    seed_user(&storage, "Alice@Example.COM", "hunter2!").await;
    let engine = engine_with(storage.clone(), grant_config());

    let mut request = token_request(GrantType::Password);
    request.username = Some("ALICE@example.com".to_string());
    request.password = Some("hunter2!".to_string());
    let response = engine
        .exchange(request, client_auth("app", Some("s3cret")))
        .await
        .unwrap();

    let stored = storage
        .get_access_token(&response.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_id.as_deref(), Some("alice@example.com"));

    let mut bad = token_request(GrantType::Password);
    bad.username = Some("alice@example.com".to_string());
    bad.password = Some("wrong".to_string());
    let result = engine.exchange(bad, client_auth("app", Some("s3cret"))).await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::InvalidGrant(_))
    ));
}

#[tokio::test]
async fn test_scope_narrowing_and_escalation() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    let engine = engine_with(storage.clone(), grant_config());

    let mut narrowed = token_request(GrantType::ClientCredentials);
    narrowed.scope = Some("read".to_string());
    let response = engine
        .exchange(narrowed, client_auth("app", Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(response.scope.as_deref(), Some("read"));

    let mut escalated = token_request(GrantType::ClientCredentials);
    escalated.scope = Some("read admin".to_string());
    let result = engine
        .exchange(escalated, client_auth("app", Some("s3cret")))
        .await;
    assert!(matches!(
        result,
        Err(docauth::errors::OAuthError::InvalidScope(_))
    ));
}

#[tokio::test]
async fn test_refresh_scope_narrowing() {
    let storage = Arc::new(MemoryOAuthStorage::new());
    seed_client(&storage, "app", Some("s3cret")).await;
    storage
        .put_refresh_token(&RefreshToken {
            refresh_token: "rt1".to_string(),
            client_id: "app".to_string(),
            user_id: Some("alice@example.com".to_string()),
            expires: None,
            scope: Some("read write".to_string()),
        })
        .await
        .unwrap();
    let engine = engine_with(storage, grant_config());

    let mut refresh = token_request(GrantType::RefreshToken);
    refresh.refresh_token = Some("rt1".to_string());
    refresh.scope = Some("read".to_string());
    let response = engine
        .exchange(refresh, client_auth("app", Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(response.scope.as_deref(), Some("read"));
}
