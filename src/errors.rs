//! Standardized error types following the `error-docauth-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-docauth-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-docauth-config-2 Parsing HTTP_PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-docauth-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-docauth-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-docauth-config-5 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),
}

/// OAuth grant processing errors
///
/// Each variant maps to exactly one OAuth2 error code on the wire; the
/// mapping lives in the token endpoint handler.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Unknown client or bad secret
    #[error("error-docauth-oauth-1 Invalid client credentials: {0}")]
    InvalidClient(String),

    /// Expired or unknown code or refresh token, or redirect_uri mismatch
    #[error("error-docauth-oauth-2 Invalid grant: {0}")]
    InvalidGrant(String),

    /// Requested scope exceeds the allowed scope
    #[error("error-docauth-oauth-3 Invalid scope: {0}")]
    InvalidScope(String),

    /// Grant type not in the client's allow-list
    #[error("error-docauth-oauth-4 Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Malformed or incomplete grant request
    #[error("error-docauth-oauth-5 Invalid request: {0}")]
    InvalidRequest(String),

    /// Backend failure, not client-attributable
    #[error("error-docauth-oauth-6 Server error: {0}")]
    ServerError(String),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when a backend operation fails
    #[error("error-docauth-storage-1 Database error: {0}")]
    DatabaseError(String),

    /// Error when data validation fails (for example a field size limit)
    #[error("error-docauth-storage-2 Invalid data: {0}")]
    InvalidData(String),

    /// Error when a requested document is not found
    #[error("error-docauth-storage-3 Not found: {0}")]
    NotFound(String),

    /// Error for operations the backend does not provide
    #[error("error-docauth-storage-4 Not implemented: {0}")]
    NotImplemented(String),

    /// Error when an in-process lock is poisoned
    #[error("error-docauth-storage-5 Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<StorageError> for OAuthError {
    fn from(err: StorageError) -> Self {
        OAuthError::ServerError(err.to_string())
    }
}
