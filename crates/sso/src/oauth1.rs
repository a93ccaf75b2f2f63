//! OAuth 1.0a request signing (HMAC-SHA1).

use std::fmt::Write as _;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    hmac::{Hmac, Mac},
    serde::{Deserialize, Serialize},
    sha1::Sha1,
    tollgate_oauth::{AuthError, Result, lifecycle::now_secs},
    url::Url,
};

type HmacSha1 = Hmac<Sha1>;

/// Provider-wide signing credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// Long-lived user token obtained from the ticket exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth1Token {
    pub token: String,
    pub token_secret: String,
}

/// RFC 3986 percent-encoding: only `A-Z a-z 0-9 - . _ ~` pass through.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            },
            _ => {
                let _ = write!(out, "%{byte:02X}");
            },
        }
    }
    out
}

/// 16 random bytes, hex-encoded. Fresh for every request.
pub fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().fold(String::with_capacity(32), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// `METHOD&enc(base_url)&enc(sorted params)`.
///
/// Query parameters already on `url` take part in the signature alongside `params`.
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .chain(
            params
                .iter()
                .map(|(k, v)| (percent_encode(k), percent_encode(v))),
        )
        .collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url.as_str()),
        percent_encode(&param_string)
    )
}

/// `enc(consumer_secret)&enc(token_secret)`; the token secret is empty before a token exists.
pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    )
}

fn hmac_sha1_base64(key: &str, data: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| AuthError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Builds `Authorization: OAuth ...` headers for one consumer.
#[derive(Debug, Clone)]
pub struct Signer {
    consumer: Consumer,
}

impl Signer {
    pub fn new(consumer: Consumer) -> Self {
        Self { consumer }
    }

    /// Header value with a fresh nonce and the current timestamp.
    pub fn authorization(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        token: Option<&OAuth1Token>,
    ) -> Result<String> {
        self.authorization_with(method, url, params, token, &generate_nonce(), now_secs())
    }

    /// Deterministic variant of [`Signer::authorization`].
    pub fn authorization_with(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        token: Option<&OAuth1Token>,
        nonce: &str,
        timestamp: u64,
    ) -> Result<String> {
        let mut oauth = self.oauth_params(token, nonce, timestamp);
        let signature = self.signature(method, url, params, &oauth, token)?;
        oauth.push(("oauth_signature".into(), signature));
        oauth.sort();

        let fields = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {fields}"))
    }

    fn oauth_params(
        &self,
        token: Option<&OAuth1Token>,
        nonce: &str,
        timestamp: u64,
    ) -> Vec<(String, String)> {
        let mut oauth = vec![
            ("oauth_consumer_key".to_string(), self.consumer.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = token {
            oauth.push(("oauth_token".to_string(), token.token.clone()));
        }
        oauth
    }

    fn signature(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        oauth: &[(String, String)],
        token: Option<&OAuth1Token>,
    ) -> Result<String> {
        let all: Vec<(String, String)> = oauth.iter().chain(params).cloned().collect();
        let base = signature_base_string(method, url, &all);
        let key = signing_key(
            &self.consumer.consumer_secret,
            token.map(|t| t.token_secret.as_str()).unwrap_or(""),
        );
        hmac_sha1_base64(&key, &base)
    }
}
