//! Handles POST /oauth/token - exchanges grants for access tokens.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use super::context::AppState;
use crate::errors::OAuthError;
use crate::oauth::types::{ClientAuthentication, GrantType, TokenRequest, TokenResponse};

/// Form data for the token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

impl TryFrom<TokenForm> for TokenRequest {
    type Error = OAuthError;

    fn try_from(form: TokenForm) -> Result<Self, Self::Error> {
        let grant_type = match form.grant_type.as_str() {
            "authorization_code" => GrantType::AuthorizationCode,
            "client_credentials" => GrantType::ClientCredentials,
            "refresh_token" => GrantType::RefreshToken,
            "password" => GrantType::Password,
            _ => return Err(OAuthError::UnsupportedGrantType(form.grant_type)),
        };

        Ok(Self {
            grant_type,
            code: form.code,
            redirect_uri: form.redirect_uri,
            refresh_token: form.refresh_token,
            username: form.username,
            password: form.password,
            client_id: form.client_id,
            client_secret: form.client_secret,
            scope: form.scope,
        })
    }
}

/// Extract client authentication from headers and form.
///
/// HTTP Basic takes precedence over form parameters.
pub fn extract_client_auth(headers: &HeaderMap, form: &TokenForm) -> Option<ClientAuthentication> {
    if let Some(auth_header) = headers.get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(encoded) = auth_str.strip_prefix("Basic ") {
                if let Ok(decoded) = BASE64_STANDARD.decode(encoded) {
                    if let Ok(credentials) = String::from_utf8(decoded) {
                        let parts: Vec<&str> = credentials.splitn(2, ':').collect();
                        if parts.len() == 2 {
                            return Some(ClientAuthentication {
                                client_id: parts[0].to_string(),
                                client_secret: Some(parts[1].to_string()),
                            });
                        }
                    }
                }
            }
        }
    }

    if let Some(client_id) = &form.client_id {
        return Some(ClientAuthentication {
            client_id: client_id.clone(),
            client_secret: form.client_secret.clone(),
        });
    }

    None
}

/// Handle OAuth token requests
/// POST /oauth/token
#[axum::debug_handler]
pub async fn handle_oauth_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<Value>)> {
    // Extract client authentication from Authorization header or form
    let client_auth = extract_client_auth(&headers, &form);

    let request = match TokenRequest::try_from(form) {
        Ok(req) => req,
        Err(e) => {
            let error_response = json!({
                "error": "unsupported_grant_type",
                "error_description": e.to_string()
            });
            return Err((StatusCode::BAD_REQUEST, Json(error_response)));
        }
    };

    match state.grant_engine.exchange(request, client_auth).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let (status, error_code) = match e {
                OAuthError::InvalidClient(_) => (StatusCode::UNAUTHORIZED, "invalid_client"),
                OAuthError::InvalidGrant(_) => (StatusCode::BAD_REQUEST, "invalid_grant"),
                OAuthError::UnsupportedGrantType(_) => {
                    (StatusCode::BAD_REQUEST, "unsupported_grant_type")
                }
                OAuthError::InvalidScope(_) => (StatusCode::BAD_REQUEST, "invalid_scope"),
                OAuthError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
            };

            let error_response = json!({
                "error": error_code,
                "error_description": e.to_string()
            });
            Err((status, Json(error_response)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(client_id: Option<&str>, client_secret: Option<&str>) -> TokenForm {
        TokenForm {
            grant_type: "client_credentials".to_string(),
            code: None,
            redirect_uri: None,
            refresh_token: None,
            username: None,
            password: None,
            client_id: client_id.map(|s| s.to_string()),
            client_secret: client_secret.map(|s| s.to_string()),
            scope: None,
        }
    }

    #[test]
    fn test_basic_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        let encoded = BASE64_STANDARD.encode("header-client:header-secret");
        headers.insert(
            "Authorization",
            format!("Basic {encoded}").parse().unwrap(),
        );

        let auth = extract_client_auth(&headers, &form(Some("form-client"), Some("form-secret")))
            .unwrap();
        assert_eq!(auth.client_id, "header-client");
        assert_eq!(auth.client_secret.as_deref(), Some("header-secret"));
    }

    #[test]
    fn test_form_fallback() {
        let headers = HeaderMap::new();
        let auth = extract_client_auth(&headers, &form(Some("app"), Some("s3cret"))).unwrap();
        assert_eq!(auth.client_id, "app");
        assert_eq!(auth.client_secret.as_deref(), Some("s3cret"));

        assert!(extract_client_auth(&headers, &form(None, None)).is_none());
    }

    #[test]
    fn test_unknown_grant_type_rejected() {
        let mut f = form(Some("app"), None);
        f.grant_type = "implicit".to_string();
        assert!(TokenRequest::try_from(f).is_err());
    }
}
