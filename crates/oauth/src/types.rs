use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// OAuth 2.0 provider endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub auth_url: String,
    pub token_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Extra query parameters to include in the authorization URL.
    #[serde(default)]
    pub extra_auth_params: Vec<(String, String)>,
}

/// App registration shared by every account of a tool.
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuth2Credentials {
    pub client_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
}

/// Stored OAuth tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp when the access token expires, safety buffer already applied.
    pub expires_at: u64,
}

/// Serialize a secret as its plain value. Only use for fields headed to a [`SecretStore`].
///
/// [`SecretStore`]: tollgate_secrets::SecretStore
pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
