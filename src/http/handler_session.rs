//! Handles GET /api/session - reports the authenticated subject.

use axum::Json;
use serde_json::{Value, json};

use super::middleware_auth::ExtractedAuth;

/// Return the subject and grant details behind the presented access token
pub async fn get_session_handler(ExtractedAuth(token): ExtractedAuth) -> Json<Value> {
    Json(json!({
        "client_id": token.client_id,
        "user_id": token.user_id,
        "scope": token.scope,
        "expires": token.expires.to_rfc3339(),
    }))
}
