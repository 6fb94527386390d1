use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;
use uuid::Uuid;

use super::base::{StorageBackend, StorageEvent, CHANGE_FEED_CAPACITY};

/// Persists slots as a flat JSON object (`{"accessToken": "..."}`) on disk.
///
/// The file survives restarts. The change feed only reaches contexts in the
/// same process; other processes see the new value on their next uncached read.
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles inside this process.
    lock: Mutex<()>,
    changes: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        FileStorage {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
            changes,
        }
    }

    async fn read_slots(&self) -> Result<BTreeMap<String, String>, String> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                format!(
                    "Failed to parse token storage '{}': {}",
                    self.path.display(),
                    e
                )
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(format!(
                "Failed to read token storage '{}': {}",
                self.path.display(),
                e
            )),
        }
    }

    async fn write_slots(&self, slots: &BTreeMap<String, String>) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
            }
        }
        let body = serde_json::to_vec_pretty(slots)
            .map_err(|e| format!("Failed to serialize token storage: {}", e))?;
        tokio::fs::write(&self.path, body).await.map_err(|e| {
            format!(
                "Failed to write token storage '{}': {}",
                self.path.display(),
                e
            )
        })
    }

    fn publish(&self, key: &str, new_value: Option<String>, origin: Uuid) {
        let _ = self.changes.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin,
        });
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    fn get_name(&self) -> &str {
        "file"
    }

    async fn load(&self, key: &str) -> Result<Option<String>, String> {
        let _guard = self.lock.lock().await;
        let slots = self.read_slots().await?;
        debug!("Loaded slot '{}' from '{}'", key, self.path.display());
        Ok(slots.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str, origin: Uuid) -> Result<(), String> {
        {
            let _guard = self.lock.lock().await;
            let mut slots = self.read_slots().await?;
            slots.insert(key.to_string(), value.to_string());
            self.write_slots(&slots).await?;
        }
        self.publish(key, Some(value.to_string()), origin);
        Ok(())
    }

    async fn remove(&self, key: &str, origin: Uuid) -> Result<(), String> {
        {
            let _guard = self.lock.lock().await;
            let mut slots = self.read_slots().await?;
            if slots.remove(key).is_some() {
                self.write_slots(&slots).await?;
            }
        }
        self.publish(key, None, origin);
        Ok(())
    }

    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        Some(self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("tokens.json"));
        assert_eq!(storage.load("accessToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let origin = Uuid::new_v4();

        let storage = FileStorage::new(&path);
        storage.save("accessToken", "persisted", origin).await.unwrap();
        storage.save("refreshToken", "offline", origin).await.unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.load("accessToken").await.unwrap(),
            Some("persisted".to_string())
        );

        reopened.remove("accessToken", origin).await.unwrap();
        assert_eq!(storage.load("accessToken").await.unwrap(), None);
        assert_eq!(
            storage.load("refreshToken").await.unwrap(),
            Some("offline".to_string())
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let storage = FileStorage::new(&path);
        let result = storage.load("accessToken").await;
        assert!(result.unwrap_err().contains("Failed to parse token storage"));
    }
}
