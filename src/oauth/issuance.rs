//! Token issuance service.
//!
//! Given a validated grant, decides whether to reuse the existing unexpired
//! access token for the subject or mint a new one, and whether to mint or
//! reattach a refresh token. Reuse avoids token churn for rapid repeated
//! grants against the same (client, user, scope) tuple; the expiry of a
//! reused token is not extended.

use crate::errors::OAuthError;
use crate::oauth::types::*;
use crate::storage::traits::OAuthStorage;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Issues access and refresh tokens through the storage port
pub struct TokenIssuer {
    storage: Arc<dyn OAuthStorage>,
    /// Token type name reported in responses
    token_type: String,
    access_lifetime: chrono::Duration,
    /// `None` mints non-expiring refresh tokens
    refresh_token_lifetime: Option<chrono::Duration>,
}

impl TokenIssuer {
    pub fn new(
        storage: Arc<dyn OAuthStorage>,
        token_type: String,
        access_lifetime: chrono::Duration,
        refresh_token_lifetime: Option<chrono::Duration>,
    ) -> Self {
        Self {
            storage,
            token_type,
            access_lifetime,
            refresh_token_lifetime,
        }
    }

    /// Reuse-or-mint an access token for the subject tuple.
    ///
    /// An existing current token is returned verbatim together with its
    /// paired refresh token; a missing pair is backfilled when
    /// `include_refresh_token` is set. Only when no current token exists is
    /// a fresh one minted.
    pub async fn create_access_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: Option<&str>,
        include_refresh_token: bool,
    ) -> Result<TokenResponse, OAuthError> {
        let now = Utc::now();

        if let Some(existing) = self
            .storage
            .find_current_access_token(client_id, user_id, scope)
            .await?
        {
            tracing::debug!(client_id, "reusing current access token");
            let refresh_token = if include_refresh_token {
                Some(self.find_or_mint_refresh_token(client_id, user_id, scope, now).await?)
            } else {
                None
            };

            let expires_in = (existing.expires - now).num_seconds().max(0) as u64;
            return Ok(TokenResponse {
                access_token: existing.access_token,
                expires_in,
                token_type: self.token_type.clone(),
                scope: existing.scope,
                refresh_token,
            });
        }

        let access_token = generate_token();
        self.storage
            .put_access_token(&AccessToken {
                access_token: access_token.clone(),
                client_id: client_id.to_string(),
                user_id: user_id.map(|u| u.to_string()),
                expires: now + self.access_lifetime,
                scope: scope.map(|s| s.to_string()),
            })
            .await?;
        tracing::debug!(client_id, "minted access token");

        let refresh_token = if include_refresh_token {
            Some(self.mint_refresh_token(client_id, user_id, scope, now).await?)
        } else {
            None
        };

        Ok(TokenResponse {
            access_token,
            expires_in: self.access_lifetime.num_seconds().max(0) as u64,
            token_type: self.token_type.clone(),
            scope: scope.map(|s| s.to_string()),
            refresh_token,
        })
    }

    /// Return the current refresh token for the tuple, minting one if none
    /// exists
    async fn find_or_mint_refresh_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, OAuthError> {
        if let Some(existing) = self
            .storage
            .find_current_refresh_token(client_id, user_id, scope)
            .await?
        {
            return Ok(existing.refresh_token);
        }
        self.mint_refresh_token(client_id, user_id, scope, now).await
    }

    async fn mint_refresh_token(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, OAuthError> {
        let refresh_token = generate_token();
        self.storage
            .put_refresh_token(&RefreshToken {
                refresh_token: refresh_token.clone(),
                client_id: client_id.to_string(),
                user_id: user_id.map(|u| u.to_string()),
                expires: self.refresh_token_lifetime.map(|lifetime| now + lifetime),
                scope: scope.map(|s| s.to_string()),
            })
            .await?;
        tracing::debug!(client_id, "minted refresh token");
        Ok(refresh_token)
    }
}
