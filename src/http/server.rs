//! Main router configuration assembling the OAuth endpoints.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    context::AppState, handler_session::get_session_handler, handler_token::handle_oauth_token,
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let protected_api_routes = Router::new().route("/session", get(get_session_handler));

    let oauth_routes = Router::new().route("/token", post(handle_oauth_token));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ]);

    Router::new()
        .nest("/api", protected_api_routes)
        .nest("/oauth", oauth_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
