//! Durable storage of the last-known wearable.
//!
//! The store has no transport awareness. It is read at launch to attempt a
//! reconnect without the interactive picker, overwritten after every confirmed
//! (re)connection and cleared on explicit unpair.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use watchlink_sync_types::DeviceIdentity;

/// File name used by [`FileDeviceStore::in_dir`].
pub const DEVICE_FILE: &str = "device.json";

/// Device store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("device store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record is unreadable or fails validation.
    #[error("invalid device identity: {0}")]
    InvalidDeviceIdentity(String),

    /// The record could not be encoded.
    #[error("device store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Persistence for one [`DeviceIdentity`].
#[async_trait]
pub trait DevicePersistenceStore: Send + Sync {
    /// Overwrite the stored identity.
    async fn save(&self, identity: &DeviceIdentity) -> Result<(), StoreError>;

    /// Read the stored identity, if any.
    async fn load(&self) -> Result<Option<DeviceIdentity>, StoreError>;

    /// Delete the stored identity. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file store, owner read/write only.
#[derive(Debug, Clone)]
pub struct FileDeviceStore {
    path: PathBuf,
}

impl FileDeviceStore {
    /// Store the identity at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the identity as `device.json` inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DEVICE_FILE))
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DevicePersistenceStore for FileDeviceStore {
    async fn save(&self, identity: &DeviceIdentity) -> Result<(), StoreError> {
        identity
            .validate()
            .map_err(|e| StoreError::InvalidDeviceIdentity(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(identity)?;
        tokio::fs::write(&self.path, contents).await?;
        set_file_permissions_0600(&self.path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<DeviceIdentity>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let identity: DeviceIdentity = serde_json::from_str(&contents)
            .map_err(|e| StoreError::InvalidDeviceIdentity(e.to_string()))?;
        identity
            .validate()
            .map_err(|e| StoreError::InvalidDeviceIdentity(e.to_string()))?;
        Ok(Some(identity))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// In-memory store for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    identity: Option<DeviceIdentity>,
    saves: usize,
}

impl MemoryDeviceStore {
    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `identity`.
    pub fn with_identity(identity: DeviceIdentity) -> Self {
        let store = Self::default();
        store.lock().identity = Some(identity);
        store
    }

    /// Current contents, without going through the async trait.
    pub fn snapshot(&self) -> Option<DeviceIdentity> {
        self.lock().identity.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }
}

#[async_trait]
impl DevicePersistenceStore for MemoryDeviceStore {
    async fn save(&self, identity: &DeviceIdentity) -> Result<(), StoreError> {
        identity
            .validate()
            .map_err(|e| StoreError::InvalidDeviceIdentity(e.to_string()))?;
        let mut inner = self.lock();
        inner.identity = Some(identity.clone());
        inner.saves += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<DeviceIdentity>, StoreError> {
        Ok(self.lock().identity.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.lock().identity = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlink_sync_types::DeviceUuid;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new(DeviceUuid::random(), "fenix 7", "Trail Watch")
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDeviceStore::in_dir(dir.path());
        let id = identity();

        assert!(store.load().await.unwrap().is_none());
        store.save(&id).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDeviceStore::in_dir(dir.path());
        store.save(&identity()).await.unwrap();

        let second = identity();
        store.save(&second).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDeviceStore::in_dir(dir.path());
        store.save(&identity()).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_invalid_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDeviceStore::in_dir(dir.path());
        tokio::fs::write(store.path(), "{ not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidDeviceIdentity(_)));
    }

    #[tokio::test]
    async fn nil_uuid_on_disk_is_invalid_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDeviceStore::in_dir(dir.path());
        let json = r#"{"uuid":"00000000-0000-0000-0000-000000000000","modelName":"x","friendlyName":"y"}"#;
        tokio::fs::write(store.path(), json).await.unwrap();

        assert!(matches!(
            store.load().await,
            Err(StoreError::InvalidDeviceIdentity(_))
        ));
    }

    #[tokio::test]
    async fn save_rejects_invalid_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDeviceStore::in_dir(dir.path());
        let bad = DeviceIdentity::new(DeviceUuid::random(), "fenix 7", "");

        assert!(store.save(&bad).await.is_err());
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileDeviceStore::in_dir(dir.path());
        store.save(&identity()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn memory_store_counts_saves() {
        let store = MemoryDeviceStore::new();
        store.save(&identity()).await.unwrap();
        store.save(&identity()).await.unwrap();
        assert_eq!(store.save_count(), 2);

        store.clear().await.unwrap();
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn memory_store_survives_poisoned_lock() {
        let store = MemoryDeviceStore::with_identity(identity());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the store");
        })
        .join();
        assert!(store.inner.is_poisoned());

        let replacement = identity();
        store.save(&replacement).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(replacement));
        assert_eq!(store.save_count(), 1);
    }
}
