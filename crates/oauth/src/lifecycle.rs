//! Expiry bookkeeping shared by the OAuth2 and SSO flows.
//!
//! A token pair moves `Fresh -> StaleAccess -> Dead`. A refresh takes a
//! `StaleAccess` pair back to `Fresh`; a `Dead` pair needs a new interactive login.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// Seconds subtracted from every provider-reported lifetime.
pub const SAFETY_BUFFER_SECS: u64 = 60;

/// Lifetime assumed when a response has no usable `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// `now + expires_in - 60`, saturating at zero.
pub fn expiry_from(now: u64, expires_in: u64) -> u64 {
    now.saturating_add(expires_in)
        .saturating_sub(SAFETY_BUFFER_SECS)
}

/// Read a lifetime field that providers send as a number, a numeric string, or not at all.
pub fn lifetime_secs(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        _ => DEFAULT_EXPIRES_IN_SECS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Access token usable as-is.
    Fresh,
    /// Access token expired, refresh token still good.
    StaleAccess,
    /// Refresh token expired too.
    Dead,
}

/// Classify a token pair. Pairs without a known refresh expiry never go `Dead`.
pub fn classify(now: u64, expires_at: u64, refresh_expires_at: Option<u64>) -> TokenState {
    if now < expires_at {
        TokenState::Fresh
    } else if refresh_expires_at.is_some_and(|r| now >= r) {
        TokenState::Dead
    } else {
        TokenState::StaleAccess
    }
}

/// Human-readable status line for `auth status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenStatus {
    pub state: TokenState,
    /// Seconds until the access token expires; zero once it has.
    pub remaining_secs: u64,
}

impl TokenStatus {
    pub fn at(now: u64, expires_at: u64, refresh_expires_at: Option<u64>) -> Self {
        Self {
            state: classify(now, expires_at, refresh_expires_at),
            remaining_secs: expires_at.saturating_sub(now),
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            TokenState::Fresh => {
                let hours = self.remaining_secs / 3600;
                let mins = (self.remaining_secs % 3600) / 60;
                write!(f, "valid ({hours}h {mins}m remaining)")
            },
            TokenState::StaleAccess => write!(f, "expired (will refresh on next use)"),
            TokenState::Dead => write!(f, "refresh expired (login required)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn test_expiry_applies_safety_buffer() {
        assert_eq!(expiry_from(1_000, 3600), 1_000 + 3600 - 60);
        assert_eq!(expiry_from(0, 30), 0);
    }

    #[test]
    fn test_lifetime_defaults() {
        assert_eq!(lifetime_secs(Some(&json!(7200))), 7200);
        assert_eq!(lifetime_secs(Some(&json!("1800"))), 1800);
        assert_eq!(lifetime_secs(Some(&json!("soon"))), DEFAULT_EXPIRES_IN_SECS);
        assert_eq!(lifetime_secs(Some(&json!(null))), DEFAULT_EXPIRES_IN_SECS);
        assert_eq!(lifetime_secs(Some(&json!(-5))), DEFAULT_EXPIRES_IN_SECS);
        assert_eq!(lifetime_secs(None), DEFAULT_EXPIRES_IN_SECS);
    }

    #[test]
    fn test_classify_transitions() {
        let now = 10_000;
        assert_eq!(classify(now, now + 1, Some(now + 100)), TokenState::Fresh);
        assert_eq!(classify(now, now, Some(now + 100)), TokenState::StaleAccess);
        assert_eq!(classify(now, now - 1, None), TokenState::StaleAccess);
        assert_eq!(classify(now, now - 1, Some(now - 1)), TokenState::Dead);
        assert_eq!(classify(now, now - 1, Some(now)), TokenState::Dead);
    }

    #[test]
    fn test_status_display() {
        let status = TokenStatus::at(0, 3 * 3600 + 15 * 60, None);
        assert_eq!(status.to_string(), "valid (3h 15m remaining)");
        assert_eq!(
            TokenStatus::at(100, 50, Some(10)).to_string(),
            "refresh expired (login required)"
        );
    }
}
