use {
    serde::{Deserialize, Serialize},
    tollgate_oauth::Result,
    url::Url,
};

/// Where the SSO provider lives. Overridable from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoEndpoints {
    /// Public JSON document holding the provider-wide OAuth1 consumer.
    pub consumer_url: String,
    /// Base of the SSO web login, e.g. `https://sso.garmin.com/sso`.
    pub sso_base: String,
    /// Base of the API host serving the OAuth endpoints.
    pub api_base: String,
    pub user_agent: String,
}

impl Default for SsoEndpoints {
    fn default() -> Self {
        Self {
            consumer_url: "https://thegarth.s3.amazonaws.com/oauth_consumer.json".into(),
            sso_base: "https://sso.garmin.com/sso".into(),
            api_base: "https://connectapi.garmin.com".into(),
            user_agent: "com.garmin.android.apps.connectmobile".into(),
        }
    }
}

impl SsoEndpoints {
    fn sso_embed(&self) -> String {
        format!("{}/embed", self.sso_base)
    }

    /// Session bootstrap page.
    pub fn embed_url(&self) -> Result<Url> {
        Ok(Url::parse_with_params(&self.sso_embed(), [
            ("id", "gauth-widget"),
            ("embedWidget", "true"),
            ("gauthHost", self.sso_base.as_str()),
        ])?)
    }

    /// Sign-in page; GET for the CSRF token, POST for the credentials.
    pub fn signin_url(&self) -> Result<Url> {
        let embed = self.sso_embed();
        Ok(Url::parse_with_params(&format!("{}/signin", self.sso_base), [
            ("id", "gauth-widget"),
            ("embedWidget", "true"),
            ("gauthHost", embed.as_str()),
            ("service", embed.as_str()),
            ("source", embed.as_str()),
            ("redirectAfterAccountLoginUrl", embed.as_str()),
            ("redirectAfterAccountCreationUrl", embed.as_str()),
        ])?)
    }

    /// Ticket to OAuth1 token.
    pub fn preauthorized_url(&self, ticket: &str) -> Result<Url> {
        let embed = self.sso_embed();
        Ok(Url::parse_with_params(
            &format!("{}/oauth-service/oauth/preauthorized", self.api_base),
            [
                ("ticket", ticket),
                ("login-url", embed.as_str()),
                ("accepts-mfa-tokens", "true"),
            ],
        )?)
    }

    /// OAuth1 token to OAuth2 tokens.
    pub fn exchange_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/oauth-service/oauth/exchange/user/2.0",
            self.api_base
        ))?)
    }

    pub fn profile_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/userprofile-service/socialProfile",
            self.api_base
        ))?)
    }
}
