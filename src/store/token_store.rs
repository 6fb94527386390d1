//! Bearer token slot shared by every outgoing request.
//!
//! The persisted backend is the source of truth; a small in-memory cache
//! avoids hitting it on each request. When another context (another token
//! store over the same backend) writes the slot, the change feed delivers the
//! new value and the cache is updated so the next `read` is consistent.
//! There is no locking across contexts: the last write wins.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::base::{StorageBackend, CHANGE_FEED_CAPACITY};

/// Cached value plus a counter bumped on every local or external change,
/// so a slow storage load never overwrites a newer value.
#[derive(Default)]
struct Cache {
    value: Option<String>,
    version: u64,
}

impl Cache {
    fn set(&mut self, value: Option<String>) {
        self.value = value;
        self.version += 1;
    }
}

pub struct TokenStore {
    id: Uuid,
    key: String,
    backend: Arc<dyn StorageBackend>,
    cache: Mutex<Cache>,
    subscribers: broadcast::Sender<Option<String>>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        let (subscribers, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        TokenStore {
            id: Uuid::new_v4(),
            key: key.into(),
            backend,
            cache: Mutex::new(Cache::default()),
            subscribers,
        }
    }

    /// Identifies this context in change events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the cached token, falling back to persisted storage on a miss.
    pub async fn read(&self) -> Result<Option<String>, String> {
        let version = {
            let cache = self.lock_cache();
            if let Some(token) = &cache.value {
                return Ok(Some(token.clone()));
            }
            cache.version
        };
        let loaded = self.backend.load(&self.key).await?;

        let mut cache = self.lock_cache();
        if cache.version != version {
            debug!("Token changed during storage load; keeping newer value");
            return Ok(cache.value.clone());
        }
        if let Some(token) = &loaded {
            debug!("Token cache populated from '{}' storage", self.backend.get_name());
            cache.value = Some(token.clone());
        }
        Ok(loaded)
    }

    /// Persists a new token and updates the cache.
    pub async fn write(&self, token: &str) -> Result<(), String> {
        self.backend.save(&self.key, token, self.id).await?;
        self.lock_cache().set(Some(token.to_string()));
        self.notify(Some(token.to_string()));
        Ok(())
    }

    /// Removes the persisted token and empties the cache.
    pub async fn clear(&self) -> Result<(), String> {
        self.backend.remove(&self.key, self.id).await?;
        self.lock_cache().set(None);
        self.notify(None);
        Ok(())
    }

    /// Applies a value written by another context.
    pub fn on_external_change(&self, new_value: Option<String>) {
        debug!(
            "External change of '{}' (present={})",
            self.key,
            new_value.is_some()
        );
        self.lock_cache().set(new_value.clone());
        self.notify(new_value);
    }

    /// Drops the cached value so the next read goes to storage.
    pub fn invalidate(&self) {
        self.lock_cache().set(None);
    }

    /// Every change of the slot, local or external.
    pub fn subscribe(&self) -> broadcast::Receiver<Option<String>> {
        self.subscribers.subscribe()
    }

    /// Spawns a task applying backend change events from other contexts.
    /// Returns `None` when the backend has no change feed.
    pub fn listen(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut feed = self.backend.watch()?;
        let store: Weak<TokenStore> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        let Some(store) = store.upgrade() else { break };
                        if event.key == store.key && event.origin != store.id {
                            store.on_external_change(event.new_value);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        let Some(store) = store.upgrade() else { break };
                        warn!(
                            "Token change feed lagged by {} events; invalidating cache",
                            skipped
                        );
                        store.invalidate();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }

    fn lock_cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().expect("token cache mutex poisoned")
    }

    fn notify(&self, value: Option<String>) {
        let _ = self.subscribers.send(value);
    }
}
