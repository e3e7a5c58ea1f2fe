//! In-memory storage implementations.

pub mod oauth;

pub use oauth::MemoryOAuthStorage;
