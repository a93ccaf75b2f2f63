use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tollgate_oauth::{
        AuthError, Result,
        lifecycle::{self, TokenState, TokenStatus},
    },
};

/// OAuth2 tokens from the OAuth1 exchange. Access and refresh expire independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: u64,
    pub refresh_expires_at: u64,
}

impl SsoTokens {
    pub fn state(&self, now: u64) -> TokenState {
        lifecycle::classify(now, self.expires_at, Some(self.refresh_expires_at))
    }

    pub fn status(&self, now: u64) -> TokenStatus {
        TokenStatus::at(now, self.expires_at, Some(self.refresh_expires_at))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    refresh_token_expires_in: Option<Value>,
}

impl ExchangeResponse {
    pub(crate) fn into_tokens(self, now: u64) -> Result<SsoTokens> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::TokenExchangeFailed("response has no access_token".into()))?;
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::TokenExchangeFailed("response has no refresh_token".into()))?;
        Ok(SsoTokens {
            access_token,
            refresh_token,
            expires_at: lifecycle::expiry_from(now, lifecycle::lifetime_secs(self.expires_in.as_ref())),
            refresh_expires_at: lifecycle::expiry_from(
                now,
                lifecycle::lifetime_secs(self.refresh_token_expires_in.as_ref()),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn test_two_independent_expiries_with_buffer() {
        let resp: ExchangeResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "refresh_token_expires_in": 7_776_000,
        }))
        .unwrap();
        let tokens = resp.into_tokens(1_000).unwrap();
        assert_eq!(tokens.expires_at, 1_000 + 3600 - 60);
        assert_eq!(tokens.refresh_expires_at, 1_000 + 7_776_000 - 60);
    }

    #[test]
    fn test_missing_access_token_is_rejected() {
        let resp: ExchangeResponse =
            serde_json::from_value(json!({"refresh_token": "r"})).unwrap();
        assert!(matches!(
            resp.into_tokens(0),
            Err(AuthError::TokenExchangeFailed(_))
        ));
    }

    #[test]
    fn test_state_follows_both_expiries() {
        let tokens = SsoTokens {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: 100,
            refresh_expires_at: 200,
        };
        assert_eq!(tokens.state(99), TokenState::Fresh);
        assert_eq!(tokens.state(150), TokenState::StaleAccess);
        assert_eq!(tokens.state(200), TokenState::Dead);
    }
}
