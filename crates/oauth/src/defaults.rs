use crate::types::OAuthConfig;

/// Providers with a built-in [`OAuthConfig`].
pub const BUILTIN_PROVIDERS: &[&str] = &["google", "oura", "whoop"];

/// Namespace holding per-tool values such as the shared app registration.
pub fn tool_namespace(provider: &str) -> String {
    format!("tollgate.{provider}")
}

/// Namespace holding one account's tokens.
pub fn account_namespace(provider: &str, account: &str) -> String {
    format!("tollgate.{provider}/{account}")
}

pub fn builtin_provider(name: &str) -> Option<OAuthConfig> {
    let config = match name {
        "google" => OAuthConfig {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            scopes: vec!["https://www.googleapis.com/auth/calendar.readonly".into()],
            // Google only issues a refresh token with offline access and a fresh consent.
            extra_auth_params: vec![
                ("access_type".into(), "offline".into()),
                ("prompt".into(), "consent".into()),
            ],
        },
        "oura" => OAuthConfig {
            auth_url: "https://cloud.ouraring.com/oauth/authorize".into(),
            token_url: "https://api.ouraring.com/oauth/token".into(),
            scopes: vec!["daily".into(), "personal".into()],
            extra_auth_params: vec![],
        },
        "whoop" => OAuthConfig {
            auth_url: "https://api.prod.whoop.com/oauth/oauth2/auth".into(),
            token_url: "https://api.prod.whoop.com/oauth/oauth2/token".into(),
            scopes: vec![
                "offline".into(),
                "read:sleep".into(),
                "read:recovery".into(),
            ],
            extra_auth_params: vec![],
        },
        _ => return None,
    };
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_resolves() {
        for name in BUILTIN_PROVIDERS {
            let config = builtin_provider(name).unwrap();
            assert!(config.auth_url.starts_with("https://"));
            assert!(config.token_url.starts_with("https://"));
        }
        assert!(builtin_provider("nope").is_none());
    }

    #[test]
    fn test_namespaces() {
        assert_eq!(tool_namespace("oura"), "tollgate.oura");
        assert_eq!(account_namespace("oura", "work"), "tollgate.oura/work");
    }
}
