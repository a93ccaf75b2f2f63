use tollgate_secrets::SecretStoreError;

/// Every failure the auth flows surface to the CLI.
///
/// User-facing variants end with the step that fixes them.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not logged in ({namespace}); run the interactive login first")]
    NotLoggedIn { namespace: String },

    #[error("no OAuth client credentials stored in {namespace}; run setup with the client id and secret")]
    MissingCredentials { namespace: String },

    #[error("token exchange failed: {0}; re-run the login")]
    TokenExchangeFailed(String),

    #[error("token refresh failed: {0}; re-run the interactive login")]
    RefreshFailed(String),

    #[error("refresh token expired, re-login required; run the interactive login again")]
    RefreshExpired,

    #[error("OAuth state mismatch on callback (possible CSRF); login aborted")]
    StateMismatch,

    #[error("no OAuth callback received within {0} seconds; login aborted, re-run it to try again")]
    Timeout(u64),

    #[error("authorization was not granted: {0}; re-run the login and approve access")]
    CallbackError(String),

    #[error("account is locked; log in once via a web browser to unlock it")]
    AccountLocked,

    #[error(
        "multi-factor authentication is required and not supported here; disable MFA or import tokens obtained elsewhere"
    )]
    MfaRequired,

    #[error("login failed; check the username and password")]
    LoginFailed,

    #[error("CSRF token not found on the sign-in page; the provider has likely changed its login markup")]
    CsrfNotFound,

    #[error("ticket exchange returned no OAuth1 token ({0}); re-run the login")]
    NoOAuth1Token(String),

    #[error("could not sign OAuth1 request: {0}")]
    Signing(String),

    #[error("unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] SecretStoreError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    pub fn invalid_response(endpoint: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}
