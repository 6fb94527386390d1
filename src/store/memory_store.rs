use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::base::{StorageBackend, StorageEvent, CHANGE_FEED_CAPACITY};

/// Process-local storage. Clones share both the slots and the change feed,
/// so two clones behave like two tabs of the same origin.
#[derive(Clone)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
    changes: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        MemoryStorage {
            slots: Arc::new(Mutex::new(HashMap::new())),
            changes,
        }
    }

    fn publish(&self, key: &str, new_value: Option<String>, origin: Uuid) {
        // No subscribers is fine: nobody else shares the slot.
        let _ = self.changes.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin,
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_name(&self) -> &str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<String>, String> {
        let slots = self.slots.lock().expect("memory storage mutex poisoned");
        Ok(slots.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str, origin: Uuid) -> Result<(), String> {
        self.slots
            .lock()
            .expect("memory storage mutex poisoned")
            .insert(key.to_string(), value.to_string());
        self.publish(key, Some(value.to_string()), origin);
        Ok(())
    }

    async fn remove(&self, key: &str, origin: Uuid) -> Result<(), String> {
        self.slots
            .lock()
            .expect("memory storage mutex poisoned")
            .remove(key);
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
    async fn test_save_load_remove() {
        let storage = MemoryStorage::new();
        let origin = Uuid::new_v4();
        assert_eq!(storage.load("accessToken").await.unwrap(), None);

        storage.save("accessToken", "abc", origin).await.unwrap();
        assert_eq!(
            storage.load("accessToken").await.unwrap(),
            Some("abc".to_string())
        );

        storage.remove("accessToken", origin).await.unwrap();
        assert_eq!(storage.load("accessToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_slots_and_feed() {
        let first = MemoryStorage::new();
        let second = first.clone();
        let mut feed = second.watch().expect("memory storage has a feed");
        let origin = Uuid::new_v4();

        first.save("accessToken", "shared", origin).await.unwrap();

        assert_eq!(
            second.load("accessToken").await.unwrap(),
            Some("shared".to_string())
        );
        let event = feed.recv().await.unwrap();
        assert_eq!(event.key, "accessToken");
        assert_eq!(event.new_value, Some("shared".to_string()));
        assert_eq!(event.origin, origin);
    }
}
