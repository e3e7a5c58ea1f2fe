//! Client and resource-owner credential validation.
//!
//! Authenticates clients against the storage port, detects public clients,
//! enforces per-client grant-type allow-lists, and checks resource-owner
//! credentials. Secret comparison is constant-time; password verification
//! is delegated to the Argon2 module.

use crate::oauth::password::verify_password;
use crate::oauth::types::GrantType;
use crate::storage::traits::{OAuthStorage, Result};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Validates client and resource-owner credentials through the storage port
pub struct ClientValidator {
    storage: Arc<dyn OAuthStorage>,
}

impl ClientValidator {
    pub fn new(storage: Arc<dyn OAuthStorage>) -> Self {
        Self { storage }
    }

    /// True iff the client exists and the presented secret matches.
    ///
    /// Public clients (empty stored secret) pass only when no secret is
    /// presented; confidential clients are compared constant-time.
    pub async fn check_client_credentials(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<bool> {
        let Some(client) = self.storage.get_client(client_id).await? else {
            return Ok(false);
        };

        let presented = client_secret.unwrap_or("");
        if client.is_public() {
            return Ok(presented.is_empty());
        }

        let stored = client.client_secret.as_deref().unwrap_or("");
        Ok(stored.as_bytes().ct_eq(presented.as_bytes()).into())
    }

    /// True iff the client exists and has an empty secret
    pub async fn is_public_client(&self, client_id: &str) -> Result<bool> {
        Ok(self
            .storage
            .get_client(client_id)
            .await?
            .is_some_and(|client| client.is_public()))
    }

    /// Enforce the per-client grant-type allow-list.
    ///
    /// A client without a configured list is unrestricted; otherwise the
    /// grant type must appear in the space-delimited list, case-sensitive.
    pub async fn check_restricted_grant_type(
        &self,
        client_id: &str,
        grant_type: GrantType,
    ) -> Result<bool> {
        let allow_list = self
            .storage
            .get_client(client_id)
            .await?
            .and_then(|client| client.grant_types);

        Ok(match allow_list {
            Some(list) => list.split(' ').any(|g| g == grant_type.as_str()),
            None => true,
        })
    }

    /// True iff the user exists and the password verifies against the
    /// stored Argon2 hash. The email is case-folded by the storage port.
    pub async fn check_user_credentials(&self, email: &str, password: &str) -> Result<bool> {
        let Some(user) = self.storage.get_user(email).await? else {
            return Ok(false);
        };
        Ok(verify_password(password, &user.password))
    }

    /// The scope configured for a client, used as the default grant scope
    pub async fn get_client_scope(&self, client_id: &str) -> Result<Option<String>> {
        Ok(self
            .storage
            .get_client(client_id)
            .await?
            .and_then(|client| client.scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::password::hash_password;
    use crate::oauth::types::{Client, User};
    use crate::storage::MemoryOAuthStorage;
    use crate::storage::traits::{ClientStore, UserStore};

    fn client(client_id: &str, secret: Option<&str>, grant_types: Option<&str>) -> Client {
        Client {
            client_id: client_id.to_string(),
            client_secret: secret.map(|s| s.to_string()),
            redirect_uri: "https://example.com/cb".to_string(),
            grant_types: grant_types.map(|g| g.to_string()),
            scope: Some("read write".to_string()),
            user_id: None,
        }
    }

    async fn validator_with(clients: &[Client]) -> ClientValidator {
        let storage = Arc::new(MemoryOAuthStorage::new());
        for c in clients {
            storage.put_client(c).await.unwrap();
        }
        ClientValidator::new(storage)
    }

    #[tokio::test]
    async fn test_confidential_client_secret_check() {
        let validator = validator_with(&[client("app", Some("s3cret"), None)]).await;
        assert!(
            validator
                .check_client_credentials("app", Some("s3cret"))
                .await
                .unwrap()
        );
        assert!(
            !validator
                .check_client_credentials("app", Some("wrong"))
                .await
                .unwrap()
        );
        assert!(
            !validator
                .check_client_credentials("app", None)
                .await
                .unwrap()
        );
        assert!(
            !validator
                .check_client_credentials("unknown", Some("s3cret"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_public_client_exempt_from_secret() {
        let validator = validator_with(&[client("pub", None, None)]).await;
        assert!(validator.is_public_client("pub").await.unwrap());
        assert!(!validator.is_public_client("unknown").await.unwrap());
        assert!(
            validator
                .check_client_credentials("pub", None)
                .await
                .unwrap()
        );
        assert!(
            validator
                .check_client_credentials("pub", Some(""))
                .await
                .unwrap()
        );
        assert!(
            !validator
                .check_client_credentials("pub", Some("anything"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_grant_type_allow_list() {
        let validator = validator_with(&[
            client("restricted", Some("s"), Some("authorization_code")),
            client("open", Some("s"), None),
        ])
        .await;

        assert!(
            validator
                .check_restricted_grant_type("restricted", GrantType::AuthorizationCode)
                .await
                .unwrap()
        );
        assert!(
            !validator
                .check_restricted_grant_type("restricted", GrantType::RefreshToken)
                .await
                .unwrap()
        );
        assert!(
            validator
                .check_restricted_grant_type("open", GrantType::RefreshToken)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_user_credentials() {
        let storage = Arc::new(MemoryOAuthStorage::new());
        storage
            .put_user(&User {
                email: "User@Example.com".to_string(),
                password: hash_password("hunter2!").unwrap(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap();
        let validator = ClientValidator::new(storage);

        assert!(
            validator
                .check_user_credentials("user@example.com", "hunter2!")
                .await
                .unwrap()
        );
        assert!(
            !validator
                .check_user_credentials("user@example.com", "hunter3!")
                .await
                .unwrap()
        );
        assert!(
            !validator
                .check_user_credentials("nobody@example.com", "hunter2!")
                .await
                .unwrap()
        );
    }
}
