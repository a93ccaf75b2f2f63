use std::{sync::Arc, time::Duration};

use {
    reqwest::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, USER_AGENT},
        redirect::Policy,
    },
    secrecy::{ExposeSecret, Secret},
    tollgate_oauth::{
        AuthError, Result, TokenState, TokenStatus, account_namespace,
        lifecycle::now_secs,
    },
    tollgate_secrets::{SecretStore, get_json, set_json},
    tracing::{debug, info, warn},
};

use crate::{
    cookies::CookieJar,
    endpoints::SsoEndpoints,
    oauth1::{Consumer, OAuth1Token, Signer},
    profile::{DISPLAY_NAME_FIELD, PROFILE_PK_FIELD},
    scrape,
    tokens::{ExchangeResponse, SsoTokens},
};

/// Namespace for provider-wide values (the OAuth1 consumer).
pub const SSO_NAMESPACE: &str = "tollgate.sso";

pub const CONSUMER_FIELD: &str = "consumer";
pub const OAUTH1_FIELD: &str = "oauth1_token";
pub const TOKENS_FIELD: &str = "oauth2_tokens";

/// Login and token upkeep for one account of the SSO provider.
pub struct SsoLoginFlow {
    endpoints: SsoEndpoints,
    client: reqwest::Client,
    secrets: Arc<dyn SecretStore>,
    namespace: String,
}

impl SsoLoginFlow {
    pub fn new(endpoints: SsoEndpoints, secrets: Arc<dyn SecretStore>, account: &str) -> Result<Self> {
        // Redirects after sign-in carry nothing we need; the ticket is in the body.
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            endpoints,
            client,
            secrets,
            namespace: account_namespace("sso", account),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn endpoints(&self) -> &SsoEndpoints {
        &self.endpoints
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn secrets(&self) -> &dyn SecretStore {
        self.secrets.as_ref()
    }

    /// Full username/password login ending with persisted OAuth1 and OAuth2 tokens.
    pub async fn login(&self, username: &str, password: &Secret<String>) -> Result<SsoTokens> {
        let consumer = self.consumer().await?;

        let mut jar = self.start_session().await?;
        let csrf = self.fetch_csrf(&mut jar).await?;
        let html = self
            .submit_credentials(&jar, &csrf, username, password)
            .await?;
        let ticket = scrape::classify_login(&html).into_ticket()?;
        debug!("sign-in accepted, exchanging ticket");

        let oauth1 = self.ticket_to_oauth1(&consumer, &ticket).await?;
        let tokens = self.exchange(&consumer, &oauth1).await?;
        info!(namespace = %self.namespace, "SSO login complete");
        Ok(tokens)
    }

    /// Store an OAuth1 token obtained elsewhere (e.g. on an MFA-enabled account)
    /// and exchange it for OAuth2 tokens.
    pub async fn import_oauth1(&self, token: OAuth1Token) -> Result<SsoTokens> {
        let consumer = self.consumer().await?;
        set_json(self.secrets(), &self.namespace, OAUTH1_FIELD, &token)?;
        info!(namespace = %self.namespace, "imported OAuth1 token");
        self.exchange(&consumer, &token).await
    }

    /// Step 1: provider-wide consumer, fetched once and cached for good.
    async fn consumer(&self) -> Result<Consumer> {
        if let Some(consumer) = get_json::<Consumer>(self.secrets(), SSO_NAMESPACE, CONSUMER_FIELD)? {
            return Ok(consumer);
        }

        debug!(url = %self.endpoints.consumer_url, "fetching OAuth1 consumer");
        let resp = self
            .client
            .get(&self.endpoints.consumer_url)
            .send()
            .await?
            .error_for_status()?;
        let consumer: Consumer = resp.json().await.map_err(|e| {
            AuthError::invalid_response(&self.endpoints.consumer_url, e.to_string())
        })?;
        if consumer.consumer_key.is_empty() || consumer.consumer_secret.is_empty() {
            return Err(AuthError::invalid_response(
                &self.endpoints.consumer_url,
                "empty consumer key or secret",
            ));
        }
        set_json(self.secrets(), SSO_NAMESPACE, CONSUMER_FIELD, &consumer)?;
        Ok(consumer)
    }

    /// Step 2: open the embed page to get session cookies.
    async fn start_session(&self) -> Result<CookieJar> {
        let resp = self
            .client
            .get(self.endpoints.embed_url()?)
            .header(USER_AGENT, &self.endpoints.user_agent)
            .send()
            .await?;
        let mut jar = CookieJar::new();
        jar.absorb(resp.headers());
        debug!(status = %resp.status(), "SSO session bootstrapped");
        Ok(jar)
    }

    /// Step 3: scrape the CSRF token from the sign-in form.
    async fn fetch_csrf(&self, jar: &mut CookieJar) -> Result<String> {
        let resp = self
            .client
            .get(self.endpoints.signin_url()?)
            .header(USER_AGENT, &self.endpoints.user_agent)
            .header(COOKIE, jar.header_value())
            .send()
            .await?;
        jar.absorb(resp.headers());
        let html = resp.text().await?;
        scrape::extract_csrf(&html).ok_or(AuthError::CsrfNotFound)
    }

    /// Step 4: post the credentials. The response body is classified by the caller.
    async fn submit_credentials(
        &self,
        jar: &CookieJar,
        csrf: &str,
        username: &str,
        password: &Secret<String>,
    ) -> Result<String> {
        let form = [
            ("username", username),
            ("password", password.expose_secret().as_str()),
            ("embed", "true"),
            ("_csrf", csrf),
        ];
        let signin = self.endpoints.signin_url()?;
        let resp = self
            .client
            .post(signin.clone())
            .header(USER_AGENT, &self.endpoints.user_agent)
            .header(COOKIE, jar.header_value())
            .header("Referer", signin.as_str())
            .form(&form)
            .send()
            .await?;
        debug!(status = %resp.status(), "credentials submitted");
        Ok(resp.text().await?)
    }

    /// Step 6: ticket to OAuth1 token, signed with the consumer only. Persisted
    /// at once so a failed exchange can be retried without logging in again.
    async fn ticket_to_oauth1(&self, consumer: &Consumer, ticket: &str) -> Result<OAuth1Token> {
        let url = self.endpoints.preauthorized_url(ticket)?;
        let authorization = Signer::new(consumer.clone()).authorization("GET", &url, &[], None)?;
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, &self.endpoints.user_agent)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        let token = parse_oauth1_body(&body)
            .ok_or_else(|| AuthError::NoOAuth1Token(format!("HTTP {status}")))?;
        set_json(self.secrets(), &self.namespace, OAUTH1_FIELD, &token)?;
        info!(namespace = %self.namespace, "saved OAuth1 token");
        Ok(token)
    }

    /// Step 7: OAuth1 token to OAuth2 tokens, signed with consumer and token secrets.
    async fn exchange(&self, consumer: &Consumer, oauth1: &OAuth1Token) -> Result<SsoTokens> {
        let url = self.endpoints.exchange_url()?;
        let authorization =
            Signer::new(consumer.clone()).authorization("POST", &url, &[], Some(oauth1))?;
        let resp = self
            .client
            .post(url)
            .header(USER_AGENT, &self.endpoints.user_agent)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("")
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(AuthError::TokenExchangeFailed(format!(
                "HTTP {status}: {snippet}"
            )));
        }
        let parsed: ExchangeResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::TokenExchangeFailed(format!("malformed response: {e}")))?;
        let tokens = parsed.into_tokens(now_secs())?;

        set_json(self.secrets(), &self.namespace, TOKENS_FIELD, &tokens)?;
        info!(
            namespace = %self.namespace,
            expires_at = tokens.expires_at,
            refresh_expires_at = tokens.refresh_expires_at,
            "saved OAuth2 tokens"
        );
        Ok(tokens)
    }

    pub fn load_tokens(&self) -> Result<Option<SsoTokens>> {
        Ok(get_json(self.secrets(), &self.namespace, TOKENS_FIELD)?)
    }

    pub fn status(&self) -> Result<Option<TokenStatus>> {
        Ok(self.load_tokens()?.map(|t| t.status(now_secs())))
    }

    /// Access token for API calls. A stale access token is renewed by re-running
    /// the OAuth1 exchange; once the refresh window has passed only a new login helps.
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let tokens = self.load_tokens()?.ok_or_else(|| AuthError::NotLoggedIn {
            namespace: self.namespace.clone(),
        })?;

        match tokens.state(now_secs()) {
            TokenState::Fresh => Ok(tokens.access_token),
            TokenState::Dead => Err(AuthError::RefreshExpired),
            TokenState::StaleAccess => {
                let oauth1: OAuth1Token = get_json(self.secrets(), &self.namespace, OAUTH1_FIELD)?
                    .ok_or_else(|| AuthError::NotLoggedIn {
                        namespace: self.namespace.clone(),
                    })?;
                let consumer = self.consumer().await?;
                debug!(namespace = %self.namespace, "access token expired, re-exchanging");
                let refreshed = self.exchange(&consumer, &oauth1).await.map_err(|e| match e {
                    AuthError::TokenExchangeFailed(msg) => AuthError::RefreshFailed(msg),
                    other => other,
                })?;
                Ok(refreshed.access_token)
            },
        }
    }

    /// Drop every per-account value, including cached profile lookups.
    /// The provider-wide consumer stays.
    pub fn logout(&self) -> Result<bool> {
        let mut removed = false;
        for field in [OAUTH1_FIELD, TOKENS_FIELD, DISPLAY_NAME_FIELD, PROFILE_PK_FIELD] {
            removed |= self.secrets.delete(&self.namespace, field)?;
        }
        if !removed {
            warn!(namespace = %self.namespace, "logout: nothing stored");
        }
        Ok(removed)
    }
}

/// Parse `oauth_token=...&oauth_token_secret=...`; both must be present and non-empty.
fn parse_oauth1_body(body: &str) -> Option<OAuth1Token> {
    let mut token = None;
    let mut token_secret = None;
    for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
        match key.as_ref() {
            "oauth_token" if !value.is_empty() => token = Some(value.into_owned()),
            "oauth_token_secret" if !value.is_empty() => token_secret = Some(value.into_owned()),
            _ => {},
        }
    }
    Some(OAuth1Token {
        token: token?,
        token_secret: token_secret?,
    })
}

/// Accept an OAuth1 token pasted as `oauth_token=..&oauth_token_secret=..`.
pub fn parse_oauth1_import(input: &str) -> Option<OAuth1Token> {
    parse_oauth1_body(input)
}

impl std::fmt::Debug for SsoLoginFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoLoginFlow")
            .field("endpoints", &self.endpoints)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
