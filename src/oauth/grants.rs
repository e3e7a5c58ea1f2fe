//! Grant engine: the grant-type state machines.
//!
//! Implements authorization-code exchange, refresh-token rotation,
//! client-credentials, and password grants. The engine is stateless between
//! requests; every step reads and writes through the storage port, and the
//! multi-step delete/insert sequences are not transactional (see the notes
//! on the refresh grant).

use crate::config::Config;
use crate::errors::OAuthError;
use crate::oauth::issuance::TokenIssuer;
use crate::oauth::types::*;
use crate::oauth::validator::ClientValidator;
use crate::storage::traits::OAuthStorage;
use chrono::Utc;
use std::sync::Arc;

/// Grant engine configuration
#[derive(Clone)]
pub struct GrantConfig {
    /// Token type name reported in responses
    pub token_type: String,
    pub access_lifetime: chrono::Duration,
    /// `None` mints non-expiring refresh tokens
    pub refresh_token_lifetime: Option<chrono::Duration>,
    pub auth_code_lifetime: chrono::Duration,
    /// Whether a refresh exchange mints a new refresh token
    pub always_issue_new_refresh_token: bool,
    /// Whether the presented refresh token is deleted after use (rotation)
    pub unset_refresh_token_after_use: bool,
}

impl From<&Config> for GrantConfig {
    fn from(config: &Config) -> Self {
        Self {
            token_type: config.token_type.clone(),
            access_lifetime: *config.access_lifetime.as_ref(),
            refresh_token_lifetime: *config.refresh_token_lifetime.as_ref(),
            auth_code_lifetime: *config.auth_code_lifetime.as_ref(),
            always_issue_new_refresh_token: config.always_issue_new_refresh_token,
            unset_refresh_token_after_use: config.unset_refresh_token_after_use,
        }
    }
}

/// Token/grant lifecycle engine
pub struct GrantEngine {
    storage: Arc<dyn OAuthStorage>,
    validator: ClientValidator,
    issuer: TokenIssuer,
    config: GrantConfig,
}

impl GrantEngine {
    pub fn new(storage: Arc<dyn OAuthStorage>, config: GrantConfig) -> Self {
        let validator = ClientValidator::new(storage.clone());
        let issuer = TokenIssuer::new(
            storage.clone(),
            config.token_type.clone(),
            config.access_lifetime,
            config.refresh_token_lifetime,
        );
        Self {
            storage,
            validator,
            issuer,
            config,
        }
    }

    /// Process a grant request end to end.
    ///
    /// Authenticates the client, enforces the grant-type allow-list, then
    /// dispatches to the grant-specific state machine. All failures are
    /// terminal for the request; nothing is retried.
    pub async fn exchange(
        &self,
        request: TokenRequest,
        client_auth: Option<ClientAuthentication>,
    ) -> Result<TokenResponse, OAuthError> {
        let client_id = client_auth
            .as_ref()
            .map(|auth| auth.client_id.clone())
            .or_else(|| request.client_id.clone())
            .ok_or_else(|| OAuthError::InvalidClient("missing client credentials".to_string()))?;
        let client_secret = client_auth
            .and_then(|auth| auth.client_secret)
            .or_else(|| request.client_secret.clone());

        if !self
            .validator
            .check_client_credentials(&client_id, client_secret.as_deref())
            .await?
        {
            return Err(OAuthError::InvalidClient(
                "client authentication failed".to_string(),
            ));
        }

        if !self
            .validator
            .check_restricted_grant_type(&client_id, request.grant_type)
            .await?
        {
            return Err(OAuthError::UnsupportedGrantType(format!(
                "client is not permitted to use {}",
                request.grant_type.as_str()
            )));
        }

        tracing::debug!(
            client_id,
            grant_type = request.grant_type.as_str(),
            "processing grant"
        );

        match request.grant_type {
            GrantType::AuthorizationCode => {
                self.handle_authorization_code(&client_id, request).await
            }
            GrantType::RefreshToken => self.handle_refresh_token(&client_id, request).await,
            GrantType::ClientCredentials => {
                self.handle_client_credentials(&client_id, request).await
            }
            GrantType::Password => self.handle_password(&client_id, request).await,
        }
    }

    /// Mint a single-use authorization code for an authenticated resource
    /// owner. This is the authorize-step half of the code lifecycle; the
    /// exchange half consumes it.
    pub async fn create_authorization_code(
        &self,
        client_id: &str,
        user_id: &str,
        redirect_uri: &str,
        scope: Option<&str>,
        id_token: Option<&str>,
    ) -> Result<String, OAuthError> {
        let client = self
            .storage
            .get_client(client_id)
            .await?
            .ok_or_else(|| OAuthError::InvalidClient("client not found".to_string()))?;

        if client.redirect_uri != redirect_uri {
            return Err(OAuthError::InvalidRequest(
                "redirect URI does not match the registered value".to_string(),
            ));
        }
        let scope = self.resolve_scope(scope, client.scope.as_deref())?;

        let code = generate_token();
        self.storage
            .put_authorization_code(&AuthorizationCode {
                authorization_code: code.clone(),
                client_id: client_id.to_string(),
                user_id: user_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
                expires: Utc::now() + self.config.auth_code_lifetime,
                scope,
                id_token: id_token.map(|t| t.to_string()),
            })
            .await?;
        Ok(code)
    }

    /// Authorization-code exchange: validate the code bindings, consume
    /// (delete) the code, then issue tokens. Consumption happens before
    /// issuance so the code is spent even if issuance fails.
    async fn handle_authorization_code(
        &self,
        client_id: &str,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let code = request
            .code
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("missing code".to_string()))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("missing redirect_uri".to_string()))?;

        let auth_code = self
            .storage
            .get_authorization_code(code)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("authorization code not found".to_string()))?;

        if auth_code.client_id != client_id {
            return Err(OAuthError::InvalidGrant(
                "authorization code was issued to another client".to_string(),
            ));
        }
        if auth_code.expires <= Utc::now() {
            return Err(OAuthError::InvalidGrant(
                "authorization code has expired".to_string(),
            ));
        }
        if auth_code.redirect_uri != redirect_uri {
            return Err(OAuthError::InvalidGrant("redirect URI mismatch".to_string()));
        }

        let scope = self.resolve_scope(request.scope.as_deref(), auth_code.scope.as_deref())?;

        // Single-use: deletion is the consumption side effect
        self.storage.consume_authorization_code(code).await?;

        self.issuer
            .create_access_token(client_id, Some(&auth_code.user_id), scope.as_deref(), true)
            .await
    }

    /// Refresh-token exchange with rotation.
    ///
    /// Loads and validates the presented token, deletes it (when rotation
    /// is configured), deletes the subject's current access token, then
    /// issues replacements. The deletes and the subsequent insert are
    /// independent writes against a non-transactional store: a crash
    /// between them can orphan an access token with no matching refresh
    /// token. The orphan expires naturally; the sweep operations are the
    /// compensation path.
    async fn handle_refresh_token(
        &self,
        client_id: &str,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let presented = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("missing refresh_token".to_string()))?;

        // Capture the pre-rotation record; it is deleted below
        let old_token = self
            .storage
            .get_refresh_token(presented)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("refresh token not found".to_string()))?;

        if old_token.client_id != client_id {
            return Err(OAuthError::InvalidGrant(
                "refresh token was issued to another client".to_string(),
            ));
        }
        if old_token.expires.is_some_and(|expires| expires <= Utc::now()) {
            return Err(OAuthError::InvalidGrant(
                "refresh token has expired".to_string(),
            ));
        }

        let scope = self.resolve_scope(request.scope.as_deref(), old_token.scope.as_deref())?;
        let user_id = old_token.user_id.as_deref();

        let issue_new_refresh_token = self.config.always_issue_new_refresh_token;

        if self.config.unset_refresh_token_after_use {
            self.storage
                .delete_refresh_token(&old_token.refresh_token)
                .await?;
            tracing::debug!(client_id, "rotated out refresh token");
        }

        // Single live access token per (client, user, scope)
        if let Some(current) = self
            .storage
            .find_current_access_token(client_id, user_id, scope.as_deref())
            .await?
        {
            self.storage
                .delete_access_token(&current.access_token)
                .await?;
        }

        self.issuer
            .create_access_token(client_id, user_id, scope.as_deref(), issue_new_refresh_token)
            .await
    }

    /// Client-credentials grant: confidential clients only, no user, no
    /// refresh token
    async fn handle_client_credentials(
        &self,
        client_id: &str,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        if self.validator.is_public_client(client_id).await? {
            return Err(OAuthError::InvalidClient(
                "public clients may not use the client_credentials grant".to_string(),
            ));
        }

        let client_scope = self.validator.get_client_scope(client_id).await?;
        let scope = self.resolve_scope(request.scope.as_deref(), client_scope.as_deref())?;

        self.issuer
            .create_access_token(client_id, None, scope.as_deref(), false)
            .await
    }

    /// Resource-owner password grant
    async fn handle_password(
        &self,
        client_id: &str,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let username = request
            .username
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("missing username".to_string()))?;
        let password = request
            .password
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("missing password".to_string()))?;

        if !self
            .validator
            .check_user_credentials(username, password)
            .await?
        {
            return Err(OAuthError::InvalidGrant(
                "invalid resource owner credentials".to_string(),
            ));
        }

        let client_scope = self.validator.get_client_scope(client_id).await?;
        let scope = self.resolve_scope(request.scope.as_deref(), client_scope.as_deref())?;
        let user_id = username.to_lowercase();

        self.issuer
            .create_access_token(client_id, Some(&user_id), scope.as_deref(), true)
            .await
    }

    /// Requested scope must be a subset of the scope fixed by the grant
    /// proof or client registration; an absent request inherits it.
    fn resolve_scope(
        &self,
        requested: Option<&str>,
        allowed: Option<&str>,
    ) -> Result<Option<String>, OAuthError> {
        match (requested, allowed) {
            (None, allowed) => Ok(allowed.map(|s| s.to_string())),
            (Some(requested), Some(allowed)) => {
                if scope_is_subset(requested, allowed) {
                    Ok(Some(requested.to_string()))
                } else {
                    Err(OAuthError::InvalidScope(
                        "requested scope exceeds the granted scope".to_string(),
                    ))
                }
            }
            (Some(_), None) => Err(OAuthError::InvalidScope(
                "no scope has been granted".to_string(),
            )),
        }
    }
}
