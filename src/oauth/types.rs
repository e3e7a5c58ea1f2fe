//! Core OAuth2 data model and token helpers.
//!
//! Defines the documents persisted through the storage port, the grant
//! request/response shapes, and scope utilities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum stored length for access tokens, refresh tokens, and codes
pub const MAX_TOKEN_LEN: usize = 40;
/// Maximum stored length for client identifiers and secrets
pub const MAX_CLIENT_ID_LEN: usize = 32;
/// Maximum stored length for redirect URIs
pub const MAX_REDIRECT_URI_LEN: usize = 1000;
/// Maximum stored length for scope strings
pub const MAX_SCOPE_LEN: usize = 2000;
/// Maximum stored length for the grant-type allow-list
pub const MAX_GRANT_TYPES_LEN: usize = 100;

/// OAuth2 grant types supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
    Password,
}

impl GrantType {
    /// Wire name, also used for allow-list membership checks
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Password => "password",
        }
    }
}

/// Registered OAuth client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier
    pub client_id: String,
    /// Client secret; `None` or empty marks a public client which is exempt
    /// from secret verification
    pub client_secret: Option<String>,
    /// Registered redirect URI, matched exactly on code exchange
    pub redirect_uri: String,
    /// Space-delimited grant-type allow-list; `None` means unrestricted
    pub grant_types: Option<String>,
    /// Scopes this client may request
    pub scope: Option<String>,
    /// Owning user
    pub user_id: Option<String>,
}

impl Client {
    /// Whether this client has no usable secret
    pub fn is_public(&self) -> bool {
        self.client_secret.as_deref().unwrap_or("").is_empty()
    }
}

/// Issued access token document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The access token value
    pub access_token: String,
    /// Issuing client
    pub client_id: String,
    /// Resource owner; `None` for client-credentials tokens
    pub user_id: Option<String>,
    /// Absolute expiry
    pub expires: DateTime<Utc>,
    /// Granted scope
    pub scope: Option<String>,
}

/// Issued refresh token document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    /// The refresh token value
    pub refresh_token: String,
    /// Issuing client
    pub client_id: String,
    /// Resource owner
    pub user_id: Option<String>,
    /// Absolute expiry; `None` means non-expiring
    pub expires: Option<DateTime<Utc>>,
    /// Granted scope
    pub scope: Option<String>,
}

/// Single-use authorization code document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The code value
    pub authorization_code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Resource owner who authorized the request
    pub user_id: String,
    /// Redirect URI bound at the authorize step
    pub redirect_uri: String,
    /// Absolute expiry
    pub expires: DateTime<Utc>,
    /// Scope fixed at the authorize step
    pub scope: Option<String>,
    /// OpenID Connect id_token carried through the exchange, if any
    pub id_token: Option<String>,
}

/// Resource owner record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique, stored case-folded to lowercase
    pub email: String,
    /// PHC-formatted password hash
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Key material for JWT-based grant types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    /// Owning client; `None` is the server-wide default pair
    pub client_id: Option<String>,
    pub public_key: String,
    pub private_key: String,
    /// Signing algorithm identifier; `None` falls back to `RS256`
    pub encryption_algorithm: Option<String>,
}

/// Per-client, per-subject public key for bearer-JWT clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientKey {
    pub client_id: String,
    pub subject: String,
    pub key: String,
}

/// Validated grant request, protocol-agnostic
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub grant_type: GrantType,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI (authorization_code grant)
    pub redirect_uri: Option<String>,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
    /// Resource owner credentials (password grant)
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// Client authentication extracted from the request
#[derive(Debug, Clone)]
pub struct ClientAuthentication {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Token response
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Remaining lifetime in seconds
    pub expires_in: u64,
    /// Token type, normally `Bearer`
    pub token_type: String,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Refresh token, when the grant carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// OAuth error response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Generate a cryptographically random token identifier.
///
/// 20 random bytes hex-encoded, exactly [`MAX_TOKEN_LEN`] characters.
pub fn generate_token() -> String {
    use rand::Rng;
    let bytes: [u8; MAX_TOKEN_LEN / 2] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

/// Parse a space-delimited scope string into a set
pub fn parse_scope(scope: &str) -> HashSet<String> {
    scope.split_whitespace().map(|s| s.to_string()).collect()
}

/// Whether `requested` is a subset of `allowed`, both space-delimited
pub fn scope_is_subset(requested: &str, allowed: &str) -> bool {
    parse_scope(requested).is_subset(&parse_scope(allowed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_length_and_uniqueness() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), MAX_TOKEN_LEN);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_scope_subset() {
        assert!(scope_is_subset("read", "read write"));
        assert!(scope_is_subset("read write", "write read"));
        assert!(!scope_is_subset("read admin", "read write"));
    }

    #[test]
    fn test_public_client_detection() {
        let mut client = Client {
            client_id: "app".to_string(),
            client_secret: None,
            redirect_uri: "https://example.com/cb".to_string(),
            grant_types: None,
            scope: None,
            user_id: None,
        };
        assert!(client.is_public());

        client.client_secret = Some(String::new());
        assert!(client.is_public());

        client.client_secret = Some("s3cret".to_string());
        assert!(!client.is_public());
    }
}
