//! Extraction from the provider's SSO HTML.
//!
//! These patterns track the provider's markup and break when it changes; keep
//! every one of them in this module.

use {once_cell::sync::Lazy, regex::Regex, tollgate_oauth::AuthError};

static CSRF_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"name="_csrf"\s+value="(.+?)""#).ok());

static TICKET_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"ticket=([^"&\s]+)"#).ok());

static LOCKED_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)\blocked\b").ok());

/// What the sign-in response says happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Ticket(String),
    AccountLocked,
    MfaRequired,
    Failed,
}

impl LoginOutcome {
    pub fn into_ticket(self) -> Result<String, AuthError> {
        match self {
            Self::Ticket(ticket) => Ok(ticket),
            Self::AccountLocked => Err(AuthError::AccountLocked),
            Self::MfaRequired => Err(AuthError::MfaRequired),
            Self::Failed => Err(AuthError::LoginFailed),
        }
    }
}

fn first_capture(re: &Option<Regex>, html: &str) -> Option<String> {
    re.as_ref()?
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_csrf(html: &str) -> Option<String> {
    first_capture(&CSRF_RE, html)
}

pub fn extract_ticket(html: &str) -> Option<String> {
    first_capture(&TICKET_RE, html)
}

/// Lock beats MFA beats ticket; anything else is bad credentials.
pub fn classify_login(html: &str) -> LoginOutcome {
    if LOCKED_RE.as_ref().is_some_and(|re| re.is_match(html)) {
        return LoginOutcome::AccountLocked;
    }
    if html.contains("MFA") {
        return LoginOutcome::MfaRequired;
    }
    match extract_ticket(html) {
        Some(ticket) => LoginOutcome::Ticket(ticket),
        None => LoginOutcome::Failed,
    }
}
