//! Credential persistence.
//!
//! Sessions are stored as four string keys in an opaque key-value store.
//! The file-backed store keeps them in a flat JSON object.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreError;

pub const KEY_BASE_URL: &str = "base_url";
pub const KEY_USERNAME: &str = "username";
pub const KEY_TOKEN: &str = "auth_token";
pub const KEY_LOGGED_IN: &str = "logged_in";

/// String key-value store holding persisted credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Forces pending writes to durable storage.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let values = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.write().unwrap().remove(key);
        Ok(())
    }
}

/// JSON-file store.
///
/// Values are cached in memory and the whole file rewritten on each change.
/// On Unix the file is restricted to the owner since it holds a token.
pub struct FileCredentialStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileCredentialStore {
    /// Opens the store, loading existing values from disk.
    pub fn new(path: PathBuf) -> Result<Self, StoreError> {
        let values = load_values(&path)?;
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let map = self.values.read().unwrap();
        let json = serde_json::to_string_pretty(&*map)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!("persisted {} credential key(s) to {:?}", map.len(), self.path);
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut map = self.values.write().unwrap();
            map.insert(key.to_string(), value.to_string());
        }
        self.persist()
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        {
            let mut map = self.values.write().unwrap();
            if map.remove(key).is_none() {
                return Ok(());
            }
        }
        self.persist()
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.persist()
    }
}

fn load_values(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    let values: HashMap<String, String> = serde_json::from_str(&data)?;
    debug!("loaded {} credential key(s) from {:?}", values.len(), path);
    Ok(values)
}

/// Per-user directory for platup files: `<config dir>/platup`.
pub fn platup_config_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("platup"))
}

/// Default credentials file: `<config dir>/platup/credentials.json`.
pub fn default_credentials_path() -> Option<PathBuf> {
    platup_config_dir().map(|d| d.join("credentials.json"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, FileCredentialStore) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        let store = FileCredentialStore::new(path).unwrap();
        (tmp, store)
    }

    #[test]
    fn new_store_empty() {
        let (_tmp, store) = test_store();
        assert!(store.get(KEY_TOKEN).is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn set_and_get() {
        let (_tmp, store) = test_store();
        store.set(KEY_TOKEN, "t1").unwrap();
        assert_eq!(store.get(KEY_TOKEN).unwrap(), "t1");
    }

    #[test]
    fn remove_key() {
        let (_tmp, store) = test_store();
        store.set(KEY_TOKEN, "t1").unwrap();
        store.remove(KEY_TOKEN).unwrap();
        assert!(store.get(KEY_TOKEN).is_none());
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let (_tmp, store) = test_store();
        store.remove(KEY_TOKEN).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn persist_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("credentials.json");

        {
            let store = FileCredentialStore::new(path.clone()).unwrap();
            store.set(KEY_BASE_URL, "https://h.io").unwrap();
            store.set(KEY_USERNAME, "alice").unwrap();
            store.set(KEY_LOGGED_IN, "true").unwrap();
        }

        let reloaded = FileCredentialStore::new(path).unwrap();
        assert_eq!(reloaded.get(KEY_BASE_URL).unwrap(), "https://h.io");
        assert_eq!(reloaded.get(KEY_USERNAME).unwrap(), "alice");
        assert_eq!(reloaded.get(KEY_LOGGED_IN).unwrap(), "true");
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (_tmp, store) = test_store();
        store.set(KEY_TOKEN, "secret").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileCredentialStore::new(path),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn memory_store_with_entries() {
        let store = MemoryCredentialStore::with_entries(&[(KEY_USERNAME, "bob")]);
        assert_eq!(store.get(KEY_USERNAME).unwrap(), "bob");
        store.remove(KEY_USERNAME).unwrap();
        assert!(store.get(KEY_USERNAME).is_none());
    }
}
