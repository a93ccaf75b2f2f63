//! OAuth2 Authorization Code flow with transparent refresh.

use std::time::Duration;

use {
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::{debug, info},
    url::Url,
};

use crate::{
    callback_server::CallbackServer,
    error::{AuthError, Result},
    lifecycle::{self, TokenState},
    state::generate_state,
    storage::TokenStore,
    types::{OAuth2Credentials, OAuthConfig, OAuthTokens},
};

/// Token endpoint response. Every field is optional so a provider error body
/// parses too; required fields are checked in [`tokens_from_response`].
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    /// Provider's own explanation, verbatim when present.
    fn failure_reason(&self) -> String {
        match (&self.error, &self.error_description) {
            (Some(error), Some(desc)) => format!("{error}: {desc}"),
            (Some(error), None) => error.clone(),
            (None, Some(desc)) => desc.clone(),
            (None, None) => "response did not include an access_token".into(),
        }
    }
}

/// Build tokens from a response. `previous_refresh` is kept when the provider
/// does not rotate the refresh token.
fn tokens_from_response(
    resp: TokenResponse,
    now: u64,
    previous_refresh: Option<&str>,
) -> std::result::Result<OAuthTokens, String> {
    let reason = resp.failure_reason();
    let Some(access_token) = resp.access_token.filter(|t| !t.is_empty()) else {
        return Err(reason);
    };
    let refresh_token = resp
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous_refresh.map(str::to_string))
        .ok_or_else(|| "provider did not return a refresh_token".to_string())?;
    Ok(OAuthTokens {
        access_token,
        refresh_token,
        expires_at: lifecycle::expiry_from(now, lifecycle::lifetime_secs(resp.expires_in.as_ref())),
    })
}

/// Pull the authorization code out of a pasted redirect URL (or a bare code).
pub fn parse_redirect(input: &str, expected_state: &str) -> Result<String> {
    let input = input.trim();
    let Ok(url) = Url::parse(input) else {
        if input.is_empty() {
            return Err(AuthError::CallbackError("no authorization code entered".into()));
        }
        return Ok(input.to_string());
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {},
        }
    }

    if let Some(error) = error {
        return Err(AuthError::CallbackError(error));
    }
    let code = code.ok_or_else(|| {
        AuthError::CallbackError("redirect URL does not contain a code parameter".into())
    })?;
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    Ok(code)
}

pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self::with_client(config, client)
    }

    pub fn with_client(config: OAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Authorization URL for the browser step. Same inputs, same URL.
    pub fn authorize_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", redirect_uri);
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
            query.append_pair("state", state);
            for (key, value) in &self.config.extra_auth_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        credentials: &OAuth2Credentials,
        redirect_uri: &str,
        code: &str,
    ) -> Result<OAuthTokens> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret().as_str()),
            ("redirect_uri", redirect_uri),
        ];
        let resp = self
            .post_token(&form)
            .await
            .map_err(AuthError::TokenExchangeFailed)?;
        let tokens = tokens_from_response(resp, lifecycle::now_secs(), None)
            .map_err(AuthError::TokenExchangeFailed)?;
        debug!(expires_at = tokens.expires_at, "exchanged authorization code");
        Ok(tokens)
    }

    /// Use a refresh token. Never retried; failure means the user logs in again.
    pub async fn refresh(
        &self,
        credentials: &OAuth2Credentials,
        refresh_token: &str,
    ) -> Result<OAuthTokens> {
        let scope = self.config.scopes.join(" ");
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret().as_str()),
        ];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }
        let resp = self
            .post_token(&form)
            .await
            .map_err(AuthError::RefreshFailed)?;
        let tokens = tokens_from_response(resp, lifecycle::now_secs(), Some(refresh_token))
            .map_err(AuthError::RefreshFailed)?;
        debug!(expires_at = tokens.expires_at, "refreshed access token");
        Ok(tokens)
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> std::result::Result<TokenResponse, String> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| e.to_string())?;
        serde_json::from_str(&body).map_err(|_| {
            let snippet: String = body.chars().take(200).collect();
            format!("HTTP {status} with non-JSON body: {snippet}")
        })
    }

    /// Access token for `account_namespace`, refreshed and persisted if it has expired.
    ///
    /// Client credentials come from `credentials_namespace` when several accounts
    /// share one app registration, else from the account namespace itself.
    pub async fn get_valid_access_token(
        &self,
        store: &TokenStore,
        account_namespace: &str,
        credentials_namespace: Option<&str>,
    ) -> Result<String> {
        let tokens = store
            .load(account_namespace)?
            .ok_or_else(|| AuthError::NotLoggedIn {
                namespace: account_namespace.to_string(),
            })?;

        let now = lifecycle::now_secs();
        if lifecycle::classify(now, tokens.expires_at, None) == TokenState::Fresh {
            return Ok(tokens.access_token);
        }

        let credentials_namespace = credentials_namespace.unwrap_or(account_namespace);
        let credentials = store.load_credentials(credentials_namespace)?.ok_or_else(|| {
            AuthError::MissingCredentials {
                namespace: credentials_namespace.to_string(),
            }
        })?;

        debug!(namespace = account_namespace, "access token expired, refreshing");
        let refreshed = self.refresh(&credentials, &tokens.refresh_token).await?;
        store.save(account_namespace, &refreshed)?;
        Ok(refreshed.access_token)
    }

    /// Full browser login through a [`CallbackServer`] on an ephemeral port.
    ///
    /// `open_browser` receives the authorization URL. Tokens are persisted only
    /// after a successful exchange.
    pub async fn login(
        &self,
        store: &TokenStore,
        account_namespace: &str,
        credentials_namespace: Option<&str>,
        open_browser: impl FnOnce(&str),
    ) -> Result<OAuthTokens> {
        let credentials = self.credentials(store, account_namespace, credentials_namespace)?;
        let state = generate_state();
        let server = CallbackServer::bind(&state).await?;
        let url = self.authorize_url(&credentials.client_id, &server.redirect_uri(), &state)?;
        open_browser(&url);

        let callback = server.wait_for_code().await?;
        let tokens = self
            .exchange_code(&credentials, &callback.redirect_uri, &callback.code)
            .await?;
        store.save(account_namespace, &tokens)?;
        info!(namespace = account_namespace, "login complete");
        Ok(tokens)
    }

    /// Login for machines without a local browser: the user opens the URL
    /// elsewhere and pastes back the redirect URL. Uses the stored redirect URI.
    pub async fn login_manual(
        &self,
        store: &TokenStore,
        account_namespace: &str,
        credentials_namespace: Option<&str>,
        prompt: impl FnOnce(&str) -> std::io::Result<String>,
    ) -> Result<OAuthTokens> {
        let credentials = self.credentials(store, account_namespace, credentials_namespace)?;
        let state = generate_state();
        let url = self.authorize_url(&credentials.client_id, &credentials.redirect_uri, &state)?;

        let pasted = prompt(&url)?;
        let code = parse_redirect(&pasted, &state)?;
        let tokens = self
            .exchange_code(&credentials, &credentials.redirect_uri, &code)
            .await?;
        store.save(account_namespace, &tokens)?;
        info!(namespace = account_namespace, "login complete");
        Ok(tokens)
    }

    fn credentials(
        &self,
        store: &TokenStore,
        account_namespace: &str,
        credentials_namespace: Option<&str>,
    ) -> Result<OAuth2Credentials> {
        let namespace = credentials_namespace.unwrap_or(account_namespace);
        store
            .load_credentials(namespace)?
            .ok_or_else(|| AuthError::MissingCredentials {
                namespace: namespace.to_string(),
            })
    }
}
