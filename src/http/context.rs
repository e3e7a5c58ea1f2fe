//! Application state shared across request handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::oauth::GrantEngine;
use crate::storage::traits::OAuthStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Storage for tokens, clients, codes, and users
    pub oauth_storage: Arc<dyn OAuthStorage>,
    /// Grant engine backing the token endpoint
    pub grant_engine: Arc<GrantEngine>,
}
