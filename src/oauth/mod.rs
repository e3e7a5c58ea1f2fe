//! OAuth2 authorization-server core: data model, credential validation,
//! token issuance, and the grant engine.

pub mod grants;
pub mod issuance;
pub mod password;
pub mod types;
pub mod validator;

pub use grants::{GrantConfig, GrantEngine};
pub use issuance::TokenIssuer;
pub use password::{hash_password, verify_password};
pub use types::*;
pub use validator::ClientValidator;
