//! Bearer token authentication for protected endpoints.
//!
//! Normalizes a lowercase `bearer` scheme before matching, validates the
//! token against storage, and extracts the token record for handlers.

use std::borrow::Cow;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http::request::Parts;
use serde_json::json;

use crate::http::AppState;
use crate::oauth::types::AccessToken;

/// Authenticated subject extractor for protected endpoints.
///
/// Validates the `Authorization: Bearer <token>` header against storage and
/// yields the stored access token record. Expired tokens are filtered out by
/// the storage lookup.
#[derive(Clone, Debug)]
pub struct ExtractedAuth(pub AccessToken);

/// Create a standard OAuth 2.0 error response
fn create_oauth_error_response(
    status: StatusCode,
    error: &str,
    error_description: &str,
) -> Response {
    let body = json!({
        "error": error,
        "error_description": error_description
    });

    (status, axum::Json(body)).into_response()
}

/// Repair a lowercase authorization scheme.
///
/// Some HTTP clients send `bearer <token>`. When the header starts with a
/// lowercase ASCII letter, only the first letter is uppercased; any other
/// casing is left untouched, so `BEARER <token>` still fails the scheme
/// match downstream.
pub fn normalize_authorization_header(value: &str) -> Cow<'_, str> {
    match value.chars().next() {
        Some(first) if first.is_ascii_lowercase() => {
            let mut normalized = String::with_capacity(value.len());
            normalized.push(first.to_ascii_uppercase());
            normalized.push_str(&value[1..]);
            Cow::Owned(normalized)
        }
        _ => Cow::Borrowed(value),
    }
}

impl<S> FromRequestParts<S> for ExtractedAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let Some(header) = parts.headers.get("Authorization") else {
            return Err(create_oauth_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_request",
                "Missing Authorization header",
            ));
        };
        let Ok(header) = header.to_str() else {
            return Err(create_oauth_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_request",
                "Malformed Authorization header",
            ));
        };

        let header = normalize_authorization_header(header);
        let Some(token) = header.strip_prefix("Bearer ") else {
            return Err(create_oauth_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_request",
                "Authorization header must use the Bearer scheme",
            ));
        };

        let access_token = app_state
            .oauth_storage
            .get_access_token(token)
            .await
            .map_err(|e| {
                tracing::error!("access token lookup failed: {}", e);
                create_oauth_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "Token validation failed",
                )
            })?;

        match access_token {
            Some(token) => Ok(ExtractedAuth(token)),
            None => Err(create_oauth_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Access token is invalid or expired",
            )),
        }
    }
}
