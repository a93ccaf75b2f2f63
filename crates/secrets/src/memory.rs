use std::{collections::HashMap, sync::Mutex};

use crate::{Result, SecretStore, SecretStoreError};

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.entries
            .lock()
            .map_err(|_| SecretStoreError::Backend("memory store lock poisoned".into()))
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, namespace: &str, field: &str) -> Result<Option<String>> {
        let entries = self.lock()?;
        Ok(entries
            .get(&(namespace.to_string(), field.to_string()))
            .cloned())
    }

    fn set(&self, namespace: &str, field: &str, value: &str) -> Result<()> {
        self.lock()?.insert(
            (namespace.to_string(), field.to_string()),
            value.to_string(),
        );
        Ok(())
    }

    fn delete(&self, namespace: &str, field: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .remove(&(namespace.to_string(), field.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let store = MemorySecretStore::new();
        assert_eq!(store.get("a", "b").unwrap(), None);
        store.set("a", "b", "v1").unwrap();
        store.set("a", "b", "v2").unwrap();
        assert_eq!(store.get("a", "b").unwrap().as_deref(), Some("v2"));
        assert!(store.delete("a", "b").unwrap());
        assert!(!store.delete("a", "b").unwrap());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemorySecretStore::new();
        store.set("tollgate.google/work", "oauth2_tokens", "w").unwrap();
        store.set("tollgate.google/home", "oauth2_tokens", "h").unwrap();
        assert_eq!(
            store
                .get("tollgate.google/work", "oauth2_tokens")
                .unwrap()
                .as_deref(),
            Some("w")
        );
        assert_eq!(
            store
                .get("tollgate.google/home", "oauth2_tokens")
                .unwrap()
                .as_deref(),
            Some("h")
        );
    }
}
