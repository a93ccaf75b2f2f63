use {
    reqwest::header::{AUTHORIZATION, USER_AGENT},
    serde::Deserialize,
    serde_json::Value,
    tollgate_oauth::{AuthError, Result},
    tracing::debug,
};

use crate::flow::SsoLoginFlow;

pub const DISPLAY_NAME_FIELD: &str = "display_name";
pub const PROFILE_PK_FIELD: &str = "profile_pk";

/// Identity values some API paths need, e.g. `/usersummary/{display_name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    pub profile_pk: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialProfile {
    display_name: Option<String>,
    profile_id: Option<Value>,
}

impl SsoLoginFlow {
    /// Cached profile, fetched with a valid access token on first use.
    /// Only [`SsoLoginFlow::logout`] clears the cache.
    pub async fn profile(&self) -> Result<Profile> {
        let namespace = self.namespace();
        if let (Some(display_name), Some(profile_pk)) = (
            self.secrets().get(namespace, DISPLAY_NAME_FIELD)?,
            self.secrets().get(namespace, PROFILE_PK_FIELD)?,
        ) {
            return Ok(Profile {
                display_name,
                profile_pk,
            });
        }

        let access_token = self.get_valid_access_token().await?;
        let url = self.endpoints().profile_url()?;
        let endpoint = url.to_string();
        let social: SocialProfile = self
            .client()
            .get(url)
            .header(USER_AGENT, &self.endpoints().user_agent)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| AuthError::invalid_response(&endpoint, e.to_string()))?;

        let display_name = social
            .display_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AuthError::invalid_response(&endpoint, "missing displayName"))?;
        let profile_pk = match social.profile_id {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Err(AuthError::invalid_response(&endpoint, "missing profileId")),
        };

        self.secrets()
            .set(namespace, DISPLAY_NAME_FIELD, &display_name)?;
        self.secrets().set(namespace, PROFILE_PK_FIELD, &profile_pk)?;
        debug!(namespace, %display_name, "cached profile");
        Ok(Profile {
            display_name,
            profile_pk,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        serde_json::json,
        tollgate_oauth::lifecycle::now_secs,
        tollgate_secrets::{MemorySecretStore, SecretStore, set_json},
        wiremock::{
            Mock, MockServer, ResponseTemplate,
            matchers::{header, method, path},
        },
    };

    use {
        super::*,
        crate::{endpoints::SsoEndpoints, flow::TOKENS_FIELD, tokens::SsoTokens},
    };

    #[tokio::test]
    async fn test_profile_is_fetched_once_then_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userprofile-service/socialProfile"))
            .and(header("authorization", "Bearer live-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "displayName": "a1b2c3",
                "profileId": 987654,
                "fullName": "Test User",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let secrets = Arc::new(MemorySecretStore::new());
        let now = now_secs();
        set_json(secrets.as_ref(), "tollgate.sso/default", TOKENS_FIELD, &SsoTokens {
            access_token: "live-token".into(),
            refresh_token: "r".into(),
            expires_at: now + 600,
            refresh_expires_at: now + 6000,
        })
        .unwrap();

        let flow = SsoLoginFlow::new(
            SsoEndpoints {
                api_base: server.uri(),
                ..SsoEndpoints::default()
            },
            secrets.clone(),
            "default",
        )
        .unwrap();

        let expected = Profile {
            display_name: "a1b2c3".into(),
            profile_pk: "987654".into(),
        };
        assert_eq!(flow.profile().await.unwrap(), expected);
        assert_eq!(flow.profile().await.unwrap(), expected);
        assert_eq!(
            secrets
                .get("tollgate.sso/default", DISPLAY_NAME_FIELD)
                .unwrap()
                .as_deref(),
            Some("a1b2c3")
        );

        flow.logout().unwrap();
        assert!(
            secrets
                .get("tollgate.sso/default", PROFILE_PK_FIELD)
                .unwrap()
                .is_none()
        );
    }
}
