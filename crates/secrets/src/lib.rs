//! Opaque secret storage addressed by `(namespace, field)`.
//!
//! Every token, client credential and cached lookup the auth flows persist goes
//! through [`SecretStore`]. Flows take the store as `Arc<dyn SecretStore>` so
//! tests can swap in [`MemorySecretStore`].

pub mod file;
pub mod memory;
#[cfg(feature = "keyring")]
pub mod os_keyring;

use serde::{Serialize, de::DeserializeOwned};

pub use {file::FileSecretStore, memory::MemorySecretStore};

#[cfg(feature = "keyring")]
pub use os_keyring::KeyringSecretStore;

#[derive(Debug, thiserror::Error)]
pub enum SecretStoreError {
    #[error("secret store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored secret {namespace}/{field} is not valid JSON: {source}")]
    Serialization {
        namespace: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("secret store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SecretStoreError>;

/// Key-value secret storage. Writes must replace a field in one step.
pub trait SecretStore: Send + Sync {
    fn get(&self, namespace: &str, field: &str) -> Result<Option<String>>;

    fn set(&self, namespace: &str, field: &str, value: &str) -> Result<()>;

    /// Returns `true` if a value was removed.
    fn delete(&self, namespace: &str, field: &str) -> Result<bool>;
}

/// Load a JSON-encoded value stored under `(namespace, field)`.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn SecretStore,
    namespace: &str,
    field: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get(namespace, field)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| SecretStoreError::Serialization {
            namespace: namespace.to_string(),
            field: field.to_string(),
            source,
        })
}

/// Store `value` as a single JSON field so the whole record is written at once.
pub fn set_json<T: Serialize>(
    store: &dyn SecretStore,
    namespace: &str,
    field: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|source| SecretStoreError::Serialization {
        namespace: namespace.to_string(),
        field: field.to_string(),
        source,
    })?;
    store.set(namespace, field, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
    struct Pair {
        token: String,
        token_secret: String,
    }

    #[test]
    fn test_json_helpers_roundtrip_through_store() {
        let store = MemorySecretStore::new();
        let pair = Pair {
            token: "tok".into(),
            token_secret: "sec".into(),
        };
        set_json(&store, "tollgate.sso/default", "oauth1_token", &pair).unwrap();
        let loaded: Option<Pair> = get_json(&store, "tollgate.sso/default", "oauth1_token").unwrap();
        assert_eq!(loaded, Some(pair));
    }

    #[test]
    fn test_get_json_missing_is_none() {
        let store = MemorySecretStore::new();
        let loaded: Option<Pair> = get_json(&store, "ns", "absent").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_get_json_rejects_garbage() {
        let store = MemorySecretStore::new();
        store.set("ns", "field", "not json").unwrap();
        let err = get_json::<Pair>(&store, "ns", "field").unwrap_err();
        assert!(matches!(err, SecretStoreError::Serialization { .. }));
    }
}
