use reqwest::header::{HeaderMap, SET_COOKIE};

/// Minimal cookie jar for the SSO session: name/value pairs only, no
/// attributes, no expiry, no domain matching.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every `Set-Cookie` header; a cookie with a known name replaces the old value.
    pub fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                self.add_set_cookie(raw);
            }
        }
    }

    /// Keep the part of a `Set-Cookie` value before the first `;`.
    pub fn add_set_cookie(&mut self, raw: &str) {
        let pair = raw.split(';').next().unwrap_or_default().trim();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        match self.cookies.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.cookies.push((name.to_string(), value.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value for a `Cookie` request header.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
