use std::{
    collections::BTreeMap,
    fmt::Write as _,
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{Result, SecretStore, SecretStoreError};

/// Stores each namespace as a JSON object in `<dir>/<namespace>.json`.
///
/// Updates are written to a sibling temp file and renamed over the original,
/// so readers see either the old or the new object, never a partial one.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.config/tollgate/secrets` (or the platform equivalent).
    pub fn default_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "tollgate").ok_or_else(|| {
            SecretStoreError::Backend("could not determine config directory".into())
        })?;
        Ok(dirs.config_dir().join("secrets"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(namespace)))
    }

    fn read(&self, namespace: &str) -> Result<BTreeMap<String, String>> {
        let path = self.path_for(namespace);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| SecretStoreError::Serialization {
            namespace: namespace.to_string(),
            field: "*".into(),
            source,
        })
    }

    fn write(&self, namespace: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        let path = self.path_for(namespace);
        if entries.is_empty() {
            match fs::remove_file(&path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }

        fs::create_dir_all(&self.dir)?;
        let raw =
            serde_json::to_string_pretty(entries).map_err(|source| SecretStoreError::Serialization {
                namespace: namespace.to_string(),
                field: "*".into(),
                source,
            })?;
        let tmp = path.with_extension("json.tmp");
        match fs::remove_file(&tmp) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }
        let mut file = owner_only_options().open(&tmp)?;
        file.write_all(raw.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "secret file updated");
        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, namespace: &str, field: &str) -> Result<Option<String>> {
        Ok(self.read(namespace)?.remove(field))
    }

    fn set(&self, namespace: &str, field: &str, value: &str) -> Result<()> {
        let mut entries = self.read(namespace)?;
        entries.insert(field.to_string(), value.to_string());
        self.write(namespace, &entries)
    }

    fn delete(&self, namespace: &str, field: &str) -> Result<bool> {
        let mut entries = self.read(namespace)?;
        if entries.remove(field).is_none() {
            return Ok(false);
        }
        self.write(namespace, &entries)?;
        Ok(true)
    }
}

/// Map a namespace such as `tollgate.google/work` to a file stem, one-to-one.
/// Every byte outside `A-Z a-z 0-9 . -` (including `_` and `%`) becomes `%XX`.
fn sanitize(namespace: &str) -> String {
    let mut out = String::with_capacity(namespace.len());
    for byte in namespace.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' => out.push(byte as char),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            },
        }
    }
    out
}

#[cfg(unix)]
fn owner_only_options() -> fs::OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(0o600);
    options
}

#[cfg(not(unix))]
fn owner_only_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_persistence() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(tmp.path());
        store.set("tollgate.oura/default", "oauth2_tokens", "{}").unwrap();

        let reopened = FileSecretStore::new(tmp.path());
        assert_eq!(
            reopened
                .get("tollgate.oura/default", "oauth2_tokens")
                .unwrap()
                .as_deref(),
            Some("{}")
        );
        assert!(tmp.path().join("tollgate.oura%2Fdefault.json").is_file());
    }

    #[test]
    fn test_delete_last_field_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(tmp.path());
        store.set("ns", "a", "1").unwrap();
        store.set("ns", "b", "2").unwrap();

        assert!(store.delete("ns", "a").unwrap());
        assert!(tmp.path().join("ns.json").is_file());
        assert!(store.delete("ns", "b").unwrap());
        assert!(!tmp.path().join("ns.json").exists());
        assert!(!store.delete("ns", "b").unwrap());
    }

    #[test]
    fn test_missing_namespace_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(tmp.path().join("not-created-yet"));
        assert_eq!(store.get("ns", "field").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_mode_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(tmp.path());
        store.set("ns", "field", "secret").unwrap();
        let mode = fs::metadata(tmp.path().join("ns.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(
            sanitize("tollgate.sso/me@example.com"),
            "tollgate.sso%2Fme%40example.com"
        );
        assert_eq!(sanitize("tollgate.google_work"), "tollgate.google%5Fwork");
        assert_eq!(sanitize("a%2F"), "a%252F");
    }

    #[test]
    fn test_similar_accounts_do_not_share_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(tmp.path());
        store
            .set("tollgate.google/me@x.com", "oauth2_tokens", "ALICE")
            .unwrap();

        assert_eq!(
            store.get("tollgate.google/me_x.com", "oauth2_tokens").unwrap(),
            None
        );
        store.set("tollgate.google_work", "oauth2_tokens", "BOB").unwrap();
        assert_eq!(
            store.get("tollgate.google/work", "oauth2_tokens").unwrap(),
            None
        );
        assert_eq!(
            store
                .get("tollgate.google/me@x.com", "oauth2_tokens")
                .unwrap()
                .as_deref(),
            Some("ALICE")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_temp_file_is_not_reused() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(tmp.path());
        let stale = tmp.path().join("ns.json.tmp");
        fs::write(&stale, "old").unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o644)).unwrap();

        store.set("ns", "field", "secret").unwrap();
        assert!(!stale.exists());
        let mode = fs::metadata(tmp.path().join("ns.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get("ns", "field").unwrap().as_deref(), Some("secret"));
    }
}
