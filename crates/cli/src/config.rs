use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result},
    serde::Deserialize,
    tollgate_oauth::{OAuthConfig, builtin_provider, defaults::BUILTIN_PROVIDERS},
    tollgate_secrets::{FileSecretStore, SecretStore},
    tollgate_sso::SsoEndpoints,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Keyring,
}

/// `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub secret_store: StoreKind,
    pub secrets_dir: Option<PathBuf>,
    /// Overrides or additions to the built-in OAuth2 providers.
    pub providers: BTreeMap<String, OAuthConfig>,
    pub sso: SsoEndpoints,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tollgate").map(|d| d.config_dir().join("config.toml"))
    }

    /// Load `path`, or the default location if it exists. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn provider(&self, name: &str) -> Result<OAuthConfig> {
        self.providers
            .get(name)
            .cloned()
            .or_else(|| builtin_provider(name))
            .with_context(|| {
                format!(
                    "unknown provider: {name} (built in: {}; add others under [providers.{name}])",
                    BUILTIN_PROVIDERS.join(", ")
                )
            })
    }

    /// Built-in providers plus configured ones, sorted and deduplicated.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_PROVIDERS.iter().map(|s| s.to_string()).collect();
        names.extend(self.providers.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    pub fn secret_store(&self) -> Result<Arc<dyn SecretStore>> {
        match self.secret_store {
            StoreKind::File => {
                let dir = match &self.secrets_dir {
                    Some(dir) => dir.clone(),
                    None => FileSecretStore::default_dir()?,
                };
                Ok(Arc::new(FileSecretStore::new(dir)))
            },
            StoreKind::Keyring => keyring_store(),
        }
    }
}

#[cfg(feature = "keyring")]
fn keyring_store() -> Result<Arc<dyn SecretStore>> {
    Ok(Arc::new(tollgate_secrets::KeyringSecretStore::new()))
}

#[cfg(not(feature = "keyring"))]
fn keyring_store() -> Result<Arc<dyn SecretStore>> {
    anyhow::bail!("secret_store = \"keyring\" needs a build with the `keyring` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.secret_store, StoreKind::File);
        assert!(config.providers.is_empty());
        assert_eq!(config.sso, SsoEndpoints::default());
        assert_eq!(
            config.provider("google").unwrap(),
            builtin_provider("google").unwrap()
        );
    }

    #[test]
    fn test_provider_override_and_addition() {
        let config = Config::parse(
            r#"
secret_store = "file"
secrets_dir = "/tmp/tollgate-test"

[providers.google]
auth_url = "https://accounts.example.com/auth"
token_url = "https://accounts.example.com/token"

[providers.todoist]
auth_url = "https://todoist.com/oauth/authorize"
token_url = "https://todoist.com/oauth/access_token"
scopes = ["data:read"]

[sso]
api_base = "http://127.0.0.1:8080"
"#,
        )
        .unwrap();

        assert_eq!(
            config.provider("google").unwrap().auth_url,
            "https://accounts.example.com/auth"
        );
        assert_eq!(config.provider("todoist").unwrap().scopes, vec!["data:read"]);
        assert!(config.provider("nope").is_err());
        assert_eq!(config.sso.api_base, "http://127.0.0.1:8080");
        assert_eq!(config.sso.sso_base, SsoEndpoints::default().sso_base);
        assert_eq!(config.provider_names(), vec![
            "google", "oura", "todoist", "whoop"
        ]);
    }

    #[test]
    fn test_load_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "secret_store = \"file\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.secret_store, StoreKind::File);

        assert!(Config::load(Some(&tmp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_file_store_uses_configured_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            secrets_dir: Some(tmp.path().to_path_buf()),
            ..Config::default()
        };
        let store = config.secret_store().unwrap();
        store.set("ns", "field", "v").unwrap();
        assert!(tmp.path().join("ns.json").is_file());
    }
}
