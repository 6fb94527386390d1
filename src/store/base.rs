use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use super::{file_store::FileStorage, memory_store::MemoryStorage};
use crate::config::{StorageBackendConfig, StorageConfig};

/// Capacity of the change feed each backend publishes on.
pub const CHANGE_FEED_CAPACITY: usize = 64;

/// A change of one persisted slot, published to every context sharing the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// The new value; `None` when the slot was removed.
    pub new_value: Option<String>,
    /// Context (token store) that performed the write.
    pub origin: Uuid,
}

/// The StorageBackend trait abstracts the persisted key-value slots
/// holding credentials (load, save, remove) plus their change feed.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_name(&self) -> &str;
    async fn load(&self, key: &str) -> Result<Option<String>, String>;
    async fn save(&self, key: &str, value: &str, origin: Uuid) -> Result<(), String>;
    async fn remove(&self, key: &str, origin: Uuid) -> Result<(), String>;
    /// Subscribes to writes made through this backend by any context.
    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        // Backends without a change feed cannot keep other contexts in sync.
        None
    }
}

/// Creates a concrete storage backend from the StorageConfig.
pub fn create_backend(config: &StorageConfig) -> Arc<dyn StorageBackend> {
    match &config.backend {
        StorageBackendConfig::Memory => {
            info!("Using in-memory token storage.");
            Arc::new(MemoryStorage::new())
        }
        StorageBackendConfig::File(file_config) => {
            info!("Using file token storage at '{}'.", file_config.path);
            Arc::new(FileStorage::new(&file_config.path))
        }
    }
}
