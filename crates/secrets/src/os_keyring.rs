use keyring::Entry;

use crate::{Result, SecretStore, SecretStoreError};

/// OS credential store (macOS Keychain, Secret Service, Windows Credential Manager).
///
/// The namespace is the keyring service and the field is the account name.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringSecretStore;

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(namespace: &str, field: &str) -> Result<Entry> {
        Entry::new(namespace, field).map_err(|err| SecretStoreError::Backend(err.to_string()))
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, namespace: &str, field: &str) -> Result<Option<String>> {
        match Self::entry(namespace, field)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(SecretStoreError::Backend(err.to_string())),
        }
    }

    fn set(&self, namespace: &str, field: &str, value: &str) -> Result<()> {
        Self::entry(namespace, field)?
            .set_password(value)
            .map_err(|err| SecretStoreError::Backend(err.to_string()))
    }

    fn delete(&self, namespace: &str, field: &str) -> Result<bool> {
        match Self::entry(namespace, field)?.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(SecretStoreError::Backend(err.to_string())),
        }
    }
}
