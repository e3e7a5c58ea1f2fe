//! Environment-based configuration for the authorization server runtime.

use anyhow::Result;

use crate::errors::ConfigError;

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        let port = value
            .parse::<u16>()
            .map_err(ConfigError::PortParsingFailed)?;
        Ok(Self(port))
    }
}

/// Access token lifetime configuration
#[derive(Clone)]
pub struct AccessLifetime(chrono::Duration);

impl AsRef<chrono::Duration> for AccessLifetime {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for AccessLifetime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Ok(Self(parse_duration(&value)?))
    }
}

/// Refresh token lifetime configuration. A configured value of `0` means
/// refresh tokens never expire.
#[derive(Clone)]
pub struct RefreshTokenLifetime(Option<chrono::Duration>);

impl AsRef<Option<chrono::Duration>> for RefreshTokenLifetime {
    fn as_ref(&self) -> &Option<chrono::Duration> {
        &self.0
    }
}

impl TryFrom<String> for RefreshTokenLifetime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        if value.trim() == "0" {
            return Ok(Self(None));
        }
        Ok(Self(Some(parse_duration(&value)?)))
    }
}

/// Authorization code lifetime configuration
#[derive(Clone)]
pub struct AuthCodeLifetime(chrono::Duration);

impl AsRef<chrono::Duration> for AuthCodeLifetime {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for AuthCodeLifetime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Ok(Self(parse_duration(&value)?))
    }
}

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub storage_backend: String,
    /// Token type name reported in token responses, normally `Bearer`
    pub token_type: String,
    pub access_lifetime: AccessLifetime,
    pub refresh_token_lifetime: RefreshTokenLifetime,
    pub auth_code_lifetime: AuthCodeLifetime,
    /// Whether a refresh exchange mints a new refresh token
    pub always_issue_new_refresh_token: bool,
    /// Whether the presented refresh token is deleted after use (rotation)
    pub unset_refresh_token_after_use: bool,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let token_type = default_env("TOKEN_TYPE", "Bearer");
        let access_lifetime: AccessLifetime = default_env("ACCESS_LIFETIME", "1h").try_into()?;
        let refresh_token_lifetime: RefreshTokenLifetime =
            default_env("REFRESH_TOKEN_LIFETIME", "14d").try_into()?;
        let auth_code_lifetime: AuthCodeLifetime =
            default_env("AUTH_CODE_LIFETIME", "30s").try_into()?;
        let always_issue_new_refresh_token =
            parse_bool(&default_env("ALWAYS_ISSUE_NEW_REFRESH_TOKEN", "true"))?;
        let unset_refresh_token_after_use =
            parse_bool(&default_env("UNSET_REFRESH_TOKEN_AFTER_USE", "true"))?;

        Ok(Self {
            version: version()?,
            http_port,
            storage_backend,
            token_type,
            access_lifetime,
            refresh_token_lifetime,
            auth_code_lifetime,
            always_issue_new_refresh_token,
            unset_refresh_token_after_use,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or(default_value.to_string())
}

fn parse_duration(value: &str) -> Result<chrono::Duration> {
    let std_duration = duration_str::parse(value)
        .map_err(|e| ConfigError::DurationParsingFailed(value.to_string(), e.to_string()))?;
    chrono::Duration::from_std(std_duration)
        .map_err(|e| ConfigError::DurationParsingFailed(value.to_string(), e.to_string()).into())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::BoolParsingFailed(value.to_string()).into()),
    }
}
