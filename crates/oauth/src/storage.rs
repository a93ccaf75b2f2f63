use std::sync::Arc;

use {
    tollgate_secrets::{SecretStore, get_json, set_json},
    tracing::info,
};

use crate::{
    error::Result,
    types::{OAuth2Credentials, OAuthTokens},
};

pub const TOKENS_FIELD: &str = "oauth2_tokens";
pub const CREDENTIALS_FIELD: &str = "oauth2_credentials";

/// Typed access to OAuth2 tokens and client credentials in a [`SecretStore`].
#[derive(Clone)]
pub struct TokenStore {
    secrets: Arc<dyn SecretStore>,
}

impl TokenStore {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    pub fn secrets(&self) -> &dyn SecretStore {
        self.secrets.as_ref()
    }

    pub fn load(&self, namespace: &str) -> Result<Option<OAuthTokens>> {
        Ok(get_json(self.secrets(), namespace, TOKENS_FIELD)?)
    }

    /// Replace the whole token record.
    pub fn save(&self, namespace: &str, tokens: &OAuthTokens) -> Result<()> {
        set_json(self.secrets(), namespace, TOKENS_FIELD, tokens)?;
        info!(namespace, expires_at = tokens.expires_at, "saved OAuth tokens");
        Ok(())
    }

    pub fn delete(&self, namespace: &str) -> Result<bool> {
        Ok(self.secrets.delete(namespace, TOKENS_FIELD)?)
    }

    pub fn load_credentials(&self, namespace: &str) -> Result<Option<OAuth2Credentials>> {
        Ok(get_json(self.secrets(), namespace, CREDENTIALS_FIELD)?)
    }

    pub fn save_credentials(&self, namespace: &str, credentials: &OAuth2Credentials) -> Result<()> {
        set_json(self.secrets(), namespace, CREDENTIALS_FIELD, credentials)?;
        info!(namespace, client_id = %credentials.client_id, "saved OAuth client credentials");
        Ok(())
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret, tollgate_secrets::MemorySecretStore};

    #[test]
    fn test_tokens_and_credentials_live_in_separate_fields() {
        let store = TokenStore::new(Arc::new(MemorySecretStore::new()));
        let tokens = OAuthTokens {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at: 42,
        };
        store.save("tollgate.oura/default", &tokens).unwrap();
        store
            .save_credentials("tollgate.oura", &OAuth2Credentials {
                client_id: "cid".into(),
                client_secret: Secret::new("cs".into()),
                redirect_uri: "http://localhost:9000".into(),
            })
            .unwrap();

        assert_eq!(store.load("tollgate.oura/default").unwrap(), Some(tokens));
        assert!(store.load("tollgate.oura").unwrap().is_none());
        assert!(
            store
                .load_credentials("tollgate.oura/default")
                .unwrap()
                .is_none()
        );
        assert_eq!(
            store
                .load_credentials("tollgate.oura")
                .unwrap()
                .unwrap()
                .client_id,
            "cid"
        );

        assert!(store.delete("tollgate.oura/default").unwrap());
        assert!(store.load("tollgate.oura/default").unwrap().is_none());
    }
}
