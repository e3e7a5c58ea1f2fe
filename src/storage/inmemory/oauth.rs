//! In-memory OAuth storage implementation.
//!
//! A document store standing in for an external backend. Each collection is
//! an independent map behind its own lock, mirroring per-document atomicity:
//! no operation here spans two collections.

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub type Result<T> = std::result::Result<T, StorageError>;

/// In-memory implementation of all storage capabilities
#[derive(Default)]
pub struct MemoryOAuthStorage {
    clients: Mutex<HashMap<String, Client>>,
    access_tokens: Mutex<HashMap<String, AccessToken>>,
    refresh_tokens: Mutex<HashMap<String, RefreshToken>>,
    auth_codes: Mutex<HashMap<String, AuthorizationCode>>,
    users: Mutex<HashMap<String, User>>,
    // (client_id, subject) -> key
    client_keys: Mutex<HashMap<(String, String), String>>,
    // client_id (None = server-wide default) -> key pair
    key_pairs: Mutex<HashMap<Option<String>, KeyPair>>,
}

impl MemoryOAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> Result<std::sync::MutexGuard<'a, T>> {
        mutex
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

/// Ordering key for the current-token lookup: non-expiring rows sort last
fn expiry_order(expires: Option<DateTime<Utc>>) -> DateTime<Utc> {
    expires.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl ClientStore for MemoryOAuthStorage {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let clients = Self::lock(&self.clients)?;
        Ok(clients.get(client_id).cloned())
    }

    async fn put_client(&self, client: &Client) -> Result<()> {
        check_len("client_id", &client.client_id, MAX_CLIENT_ID_LEN)?;
        if let Some(secret) = &client.client_secret {
            check_len("client_secret", secret, MAX_CLIENT_ID_LEN)?;
        }
        check_len("redirect_uri", &client.redirect_uri, MAX_REDIRECT_URI_LEN)?;
        if let Some(grant_types) = &client.grant_types {
            check_len("grant_types", grant_types, MAX_GRANT_TYPES_LEN)?;
        }
        if let Some(scope) = &client.scope {
            check_len("scope", scope, MAX_SCOPE_LEN)?;
        }

        let mut clients = Self::lock(&self.clients)?;
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }
}

#[async_trait]
impl AccessTokenStore for MemoryOAuthStorage {
    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let tokens = Self::lock(&self.access_tokens)?;
        match tokens.get(token) {
            Some(access_token) if access_token.expires > Utc::now() => {
                Ok(Some(access_token.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_current_access_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: Option<&str>,
    ) -> Result<Option<AccessToken>> {
        let tokens = Self::lock(&self.access_tokens)?;
        let now = Utc::now();
        Ok(tokens
            .values()
            .filter(|t| {
                t.client_id == client_id
                    && t.user_id.as_deref() == user_id
                    && t.scope.as_deref() == scope
                    && t.expires > now
            })
            .min_by_key(|t| t.expires)
            .cloned())
    }

    async fn put_access_token(&self, token: &AccessToken) -> Result<()> {
        check_len("access_token", &token.access_token, MAX_TOKEN_LEN)?;
        check_len("client_id", &token.client_id, MAX_CLIENT_ID_LEN)?;
        if let Some(scope) = &token.scope {
            check_len("scope", scope, MAX_SCOPE_LEN)?;
        }

        let mut tokens = Self::lock(&self.access_tokens)?;
        tokens.insert(token.access_token.clone(), token.clone());
        Ok(())
    }

    async fn delete_access_token(&self, token: &str) -> Result<bool> {
        let mut tokens = Self::lock(&self.access_tokens)?;
        Ok(tokens.remove(token).is_some())
    }

    async fn sweep_expired_access_tokens(&self) -> Result<usize> {
        let mut tokens = Self::lock(&self.access_tokens)?;
        let now = Utc::now();
        let initial = tokens.len();
        tokens.retain(|_, t| t.expires > now);
        Ok(initial - tokens.len())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryOAuthStorage {
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let tokens = Self::lock(&self.refresh_tokens)?;
        Ok(tokens.get(token).cloned())
    }

    async fn find_current_refresh_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: Option<&str>,
    ) -> Result<Option<RefreshToken>> {
        let tokens = Self::lock(&self.refresh_tokens)?;
        let now = Utc::now();
        Ok(tokens
            .values()
            .filter(|t| {
                t.client_id == client_id
                    && t.user_id.as_deref() == user_id
                    && t.scope.as_deref() == scope
                    && t.expires.is_none_or(|expires| expires > now)
            })
            .min_by_key(|t| expiry_order(t.expires))
            .cloned())
    }

    async fn put_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        check_len("refresh_token", &token.refresh_token, MAX_TOKEN_LEN)?;
        check_len("client_id", &token.client_id, MAX_CLIENT_ID_LEN)?;
        if let Some(scope) = &token.scope {
            check_len("scope", scope, MAX_SCOPE_LEN)?;
        }

        let mut tokens = Self::lock(&self.refresh_tokens)?;
        tokens.insert(token.refresh_token.clone(), token.clone());
        Ok(())
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool> {
        let mut tokens = Self::lock(&self.refresh_tokens)?;
        Ok(tokens.remove(token).is_some())
    }

    async fn sweep_expired_refresh_tokens(&self) -> Result<usize> {
        let mut tokens = Self::lock(&self.refresh_tokens)?;
        let now = Utc::now();
        let initial = tokens.len();
        tokens.retain(|_, t| t.expires.is_none_or(|expires| expires > now));
        Ok(initial - tokens.len())
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryOAuthStorage {
    async fn get_authorization_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        let codes = Self::lock(&self.auth_codes)?;
        Ok(codes.get(code).cloned())
    }

    async fn put_authorization_code(&self, code: &AuthorizationCode) -> Result<()> {
        check_len(
            "authorization_code",
            &code.authorization_code,
            MAX_TOKEN_LEN,
        )?;
        check_len("client_id", &code.client_id, MAX_CLIENT_ID_LEN)?;
        check_len("redirect_uri", &code.redirect_uri, MAX_REDIRECT_URI_LEN)?;
        if let Some(scope) = &code.scope {
            check_len("scope", scope, MAX_SCOPE_LEN)?;
        }

        let mut codes = Self::lock(&self.auth_codes)?;
        codes.insert(code.authorization_code.clone(), code.clone());
        Ok(())
    }

    async fn consume_authorization_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        let mut codes = Self::lock(&self.auth_codes)?;
        Ok(codes.remove(code))
    }

    async fn sweep_expired_authorization_codes(&self) -> Result<usize> {
        let mut codes = Self::lock(&self.auth_codes)?;
        let now = Utc::now();
        let initial = codes.len();
        codes.retain(|_, c| c.expires > now);
        Ok(initial - codes.len())
    }
}

#[async_trait]
impl UserStore for MemoryOAuthStorage {
    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        let users = Self::lock(&self.users)?;
        Ok(users.get(&email.to_lowercase()).cloned())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        let mut users = Self::lock(&self.users)?;
        let email = user.email.to_lowercase();
        users.insert(
            email.clone(),
            User {
                email,
                ..user.clone()
            },
        );
        Ok(())
    }
}

#[async_trait]
impl KeyStore for MemoryOAuthStorage {
    async fn get_client_key(&self, client_id: &str, subject: &str) -> Result<Option<String>> {
        let keys = Self::lock(&self.client_keys)?;
        Ok(keys
            .get(&(client_id.to_string(), subject.to_string()))
            .cloned())
    }

    async fn get_public_key(&self, client_id: Option<&str>) -> Result<Option<String>> {
        let pairs = Self::lock(&self.key_pairs)?;
        let pair = pairs
            .get(&client_id.map(|c| c.to_string()))
            .or_else(|| pairs.get(&None));
        Ok(pair.map(|p| p.public_key.clone()))
    }

    async fn get_private_key(&self, client_id: Option<&str>) -> Result<Option<String>> {
        let pairs = Self::lock(&self.key_pairs)?;
        let pair = pairs
            .get(&client_id.map(|c| c.to_string()))
            .or_else(|| pairs.get(&None));
        Ok(pair.map(|p| p.private_key.clone()))
    }

    async fn get_encryption_algorithm(&self, client_id: Option<&str>) -> Result<String> {
        let pairs = Self::lock(&self.key_pairs)?;
        let pair = pairs
            .get(&client_id.map(|c| c.to_string()))
            .or_else(|| pairs.get(&None));
        Ok(pair
            .and_then(|p| p.encryption_algorithm.clone())
            .unwrap_or_else(|| DEFAULT_ENCRYPTION_ALGORITHM.to_string()))
    }

    async fn put_key_pair(&self, pair: &KeyPair) -> Result<()> {
        let mut pairs = Self::lock(&self.key_pairs)?;
        pairs.insert(pair.client_id.clone(), pair.clone());
        Ok(())
    }

    async fn put_client_key(&self, key: &ClientKey) -> Result<()> {
        let mut keys = Self::lock(&self.client_keys)?;
        keys.insert(
            (key.client_id.clone(), key.subject.clone()),
            key.key.clone(),
        );
        Ok(())
    }

    async fn get_jti(
        &self,
        _client_id: &str,
        _subject: &str,
        _audience: &str,
        _expires: i64,
        _jti: &str,
    ) -> Result<Option<String>> {
        Err(StorageError::NotImplemented(
            "JTI replay protection is not provided by this backend".to_string(),
        ))
    }

    async fn set_jti(
        &self,
        _client_id: &str,
        _subject: &str,
        _audience: &str,
        _expires: i64,
        _jti: &str,
    ) -> Result<()> {
        Err(StorageError::NotImplemented(
            "JTI replay protection is not provided by this backend".to_string(),
        ))
    }
}

impl OAuthStorage for MemoryOAuthStorage {}
