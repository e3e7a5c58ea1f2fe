//! Storage trait definitions for the OAuth document collections.
//!
//! Capability-segregated async interfaces over a document store: clients,
//! access tokens, refresh tokens, authorization codes, users, and key
//! material. Implementations provide per-document atomicity only; nothing
//! here may be assumed to span documents transactionally.

use crate::errors::StorageError;
use crate::oauth::types::*;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Default signing algorithm when none is configured for a key pair
pub const DEFAULT_ENCRYPTION_ALGORITHM: &str = "RS256";

/// Reject values exceeding the stored field size limits
pub(crate) fn check_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(StorageError::InvalidData(format!(
            "{} exceeds {} bytes",
            field, max
        )));
    }
    Ok(())
}

/// Trait for storing and retrieving OAuth clients
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Retrieve a client by ID
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>>;

    /// Insert or update a client by its `client_id`
    async fn put_client(&self, client: &Client) -> Result<()>;
}

/// Trait for storing and retrieving access tokens
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    /// Retrieve an unexpired access token by value; expired rows are
    /// excluded, not purged
    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>>;

    /// Find the current token for a (client, user, scope) tuple: the
    /// lowest-expires row among unexpired matches
    async fn find_current_access_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: Option<&str>,
    ) -> Result<Option<AccessToken>>;

    /// Insert or update an access token by its value
    async fn put_access_token(&self, token: &AccessToken) -> Result<()>;

    /// Remove an access token; returns whether a row was removed
    async fn delete_access_token(&self, token: &str) -> Result<bool>;

    /// Delete expired rows; the compensation mechanism for stale documents
    async fn sweep_expired_access_tokens(&self) -> Result<usize>;
}

/// Trait for storing and retrieving refresh tokens
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Retrieve a refresh token by value. Rows are returned as stored;
    /// expiry is enforced by the grant engine
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Find the current refresh token for a (client, user, scope) tuple
    async fn find_current_refresh_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: Option<&str>,
    ) -> Result<Option<RefreshToken>>;

    /// Insert or update a refresh token by its value
    async fn put_refresh_token(&self, token: &RefreshToken) -> Result<()>;

    /// Remove a refresh token; returns whether a row was removed
    async fn delete_refresh_token(&self, token: &str) -> Result<bool>;

    /// Delete expired rows
    async fn sweep_expired_refresh_tokens(&self) -> Result<usize>;
}

/// Trait for storing and consuming single-use authorization codes
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Retrieve a code by value without consuming it
    async fn get_authorization_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Insert or update a code by its value
    async fn put_authorization_code(&self, code: &AuthorizationCode) -> Result<()>;

    /// Remove and return a code. Deletion is the consumption side effect:
    /// codes are single-use, not single-valid
    async fn consume_authorization_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Delete expired rows
    async fn sweep_expired_authorization_codes(&self) -> Result<usize>;
}

/// Trait for storing and retrieving resource owners
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Retrieve a user; the email is lowercased before lookup
    async fn get_user(&self, email: &str) -> Result<Option<User>>;

    /// Insert or update a user; the email is lowercased before storage
    async fn put_user(&self, user: &User) -> Result<()>;
}

/// Trait for key-material lookups used by JWT grant types
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Public key registered for a (client, subject) pair
    async fn get_client_key(&self, client_id: &str, subject: &str) -> Result<Option<String>>;

    /// Per-client public key, falling back to the server-wide pair
    async fn get_public_key(&self, client_id: Option<&str>) -> Result<Option<String>>;

    /// Per-client private key, falling back to the server-wide pair
    async fn get_private_key(&self, client_id: Option<&str>) -> Result<Option<String>>;

    /// Configured signing algorithm, or [`DEFAULT_ENCRYPTION_ALGORITHM`]
    async fn get_encryption_algorithm(&self, client_id: Option<&str>) -> Result<String>;

    /// Insert or update a key pair
    async fn put_key_pair(&self, pair: &KeyPair) -> Result<()>;

    /// Insert or update a per-subject client key
    async fn put_client_key(&self, key: &ClientKey) -> Result<()>;

    /// JTI replay-protection lookup. Not provided by this backend; fails
    /// with [`StorageError::NotImplemented`]
    async fn get_jti(
        &self,
        client_id: &str,
        subject: &str,
        audience: &str,
        expires: i64,
        jti: &str,
    ) -> Result<Option<String>>;

    /// JTI replay-protection registration. Not provided by this backend;
    /// fails with [`StorageError::NotImplemented`]
    async fn set_jti(
        &self,
        client_id: &str,
        subject: &str,
        audience: &str,
        expires: i64,
        jti: &str,
    ) -> Result<()>;
}

/// Combined storage trait composed by the grant engine
pub trait OAuthStorage:
    ClientStore
    + AccessTokenStore
    + RefreshTokenStore
    + AuthorizationCodeStore
    + UserStore
    + KeyStore
    + Send
    + Sync
{
}
