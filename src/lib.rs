//! OAuth2 authorization server backend over a document store.
//!
//! Implements the token and grant lifecycle engine: authorization-code
//! exchange, refresh-token rotation, client-credentials and password grants,
//! with single-active-token-per-subject semantics against a storage backend
//! that offers only per-document atomicity.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;
