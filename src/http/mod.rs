//! Axum HTTP server handlers and middleware for the OAuth token endpoint.

pub mod context;
mod handler_session;
mod handler_token;
pub mod middleware_auth;
pub mod server;

pub use context::AppState;
pub use server::build_router;
