//! Durable key/value backends for the refresh token
//!
//! - [`MemoryStore`]: process memory, used for ephemeral sessions and tests
//! - [`FileStore`]: one JSON document on disk, replaced atomically on write
//! - [`KeyringStore`]: platform keychain (`platform` feature)

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::traits::DurableStore;

/// Key under which the obfuscated refresh token is stored.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// A persisted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub value: String,
    /// Milliseconds since the UNIX epoch
    pub created_at: i64,
}

/// Durable store failure
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot be opened at all (no keychain service, read-only
    /// volume, private browsing equivalents).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("keychain error: {0}")]
    Keychain(String),

    #[error("storage task failed: {0}")]
    TaskJoin(String),
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: parking_lot::Mutex<BTreeMap<String, StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn put(&self, record: StoredRecord) -> Result<(), StorageError> {
        self.records.lock().insert(record.key.clone(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.records.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.records.lock().clear();
        Ok(())
    }
}

/// JSON file store
///
/// The whole document is rewritten on every mutation: write to a sibling
/// temp file, then rename over the target. The async mutex serializes
/// read-modify-write cycles within the process.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, StoredRecord>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, records: &BTreeMap<String, StoredRecord>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn put(&self, record: StoredRecord) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.key.clone(), record);
        self.save(&records).await
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        if records.remove(key).is_some() {
            self.save(&records).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "credential file removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(feature = "platform")]
pub use keyring_store::KeyringStore;

#[cfg(feature = "platform")]
mod keyring_store {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use keyring::Entry;
    use parking_lot::Mutex;
    use tracing::debug;

    use super::{StorageError, StoredRecord};
    use crate::auth::traits::DurableStore;

    /// Platform keychain store (macOS Keychain, Windows Credential Manager,
    /// Linux Secret Service)
    ///
    /// Each key becomes one keychain entry under `service`; the record is
    /// stored as its JSON encoding. The keychain cannot enumerate entries, so
    /// the keys this store has written are tracked for [`DurableStore::clear`],
    /// seeded with the known credential keys.
    #[derive(Debug, Clone)]
    pub struct KeyringStore {
        service: String,
        known_keys: Arc<Mutex<BTreeSet<String>>>,
    }

    impl KeyringStore {
        pub fn new(service: impl Into<String>) -> Self {
            let known_keys = BTreeSet::from([super::REFRESH_TOKEN_KEY.to_string()]);
            Self { service: service.into(), known_keys: Arc::new(Mutex::new(known_keys)) }
        }

        pub fn service(&self) -> &str {
            &self.service
        }

        async fn blocking<T, F>(&self, key: String, op: F) -> Result<T, StorageError>
        where
            T: Send + 'static,
            F: FnOnce(Entry) -> Result<T, keyring::Error> + Send + 'static,
        {
            let service = self.service.clone();
            tokio::task::spawn_blocking(move || {
                let entry = Entry::new(&service, &key).map_err(map_keyring_error)?;
                op(entry).map_err(map_keyring_error)
            })
            .await
            .map_err(|err| StorageError::TaskJoin(err.to_string()))?
        }
    }

    fn map_keyring_error(err: keyring::Error) -> StorageError {
        match err {
            keyring::Error::NoStorageAccess(inner) => StorageError::Unavailable(inner.to_string()),
            keyring::Error::PlatformFailure(inner) => StorageError::Unavailable(inner.to_string()),
            other => StorageError::Keychain(other.to_string()),
        }
    }

    #[async_trait]
    impl DurableStore for KeyringStore {
        async fn put(&self, record: StoredRecord) -> Result<(), StorageError> {
            let key = record.key.clone();
            let payload = serde_json::to_string(&record)?;
            self.blocking(key.clone(), move |entry| entry.set_password(&payload)).await?;
            self.known_keys.lock().insert(key);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
            let payload = self
                .blocking(key.to_string(), |entry| match entry.get_password() {
                    Ok(payload) => Ok(Some(payload)),
                    Err(keyring::Error::NoEntry) => Ok(None),
                    Err(err) => Err(err),
                })
                .await?;

            payload.map(|payload| serde_json::from_str(&payload)).transpose().map_err(Into::into)
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.blocking(key.to_string(), |entry| match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(err) => Err(err),
            })
            .await?;
            self.known_keys.lock().remove(key);
            Ok(())
        }

        async fn clear(&self) -> Result<(), StorageError> {
            let keys: Vec<String> = self.known_keys.lock().iter().cloned().collect();
            for key in keys {
                self.delete(&key).await?;
            }
            debug!(service = %self.service, "keychain credentials cleared");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn record(key: &str, value: &str) -> StoredRecord {
        StoredRecord { key: key.into(), value: value.into(), created_at: 1_700_000_000_000 }
    }

    #[tokio::test]
    async fn memory_store_put_get_delete_clear() {
        let store = MemoryStore::new();
        store.put(record("a", "1")).await.unwrap();
        store.put(record("b", "2")).await.unwrap();
        store.put(record("a", "3")).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").await.unwrap().unwrap().value, "3");

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    /// Validates the file store against a fresh directory.
    ///
    /// Assertions:
    /// - Parent directories are created on first write.
    /// - Records survive a new store instance over the same path.
    /// - `clear` removes the file and is idempotent.
    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("auth.json");

        let store = FileStore::new(&path);
        assert!(store.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
        store.put(record(REFRESH_TOKEN_KEY, "obfuscated")).await.unwrap();
        assert!(path.exists());

        let reopened = FileStore::new(&path);
        let loaded = reopened.get(REFRESH_TOKEN_KEY).await.unwrap().unwrap();
        assert_eq!(loaded.value, "obfuscated");
        assert_eq!(loaded.created_at, 1_700_000_000_000);

        reopened.clear().await.unwrap();
        assert!(!path.exists());
        reopened.clear().await.unwrap();
    }

    #[tokio::test]
    async fn file_store_rejects_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get(REFRESH_TOKEN_KEY).await, Err(StorageError::Serialization(_))));
    }

    #[tokio::test]
    async fn file_store_delete_keeps_other_records() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("auth.json"));
        store.put(record("a", "1")).await.unwrap();
        store.put(record("b", "2")).await.unwrap();

        store.delete("a").await.unwrap();
        store.delete("missing").await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(store.get("b").await.unwrap().unwrap().value, "2");
    }
}
