use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::openid_refresher::OpenIdRefresher;
use crate::config::{RefreshConfig, StorageConfig};
use crate::store::{StorageBackend, TokenStore};

/// A Refresher silently obtains a new bearer token from an existing session credential.
#[async_trait]
pub trait Refresher: Send + Sync {
    /// A descriptive name for the refresher (for logs/debug).
    fn get_name(&self) -> &str;

    /// Produces a new bearer token, given the one that was rejected.
    async fn refresh(&self, current_token: Option<&str>) -> Result<String, String>;
}

/// Used when silent refresh is disabled: every refresh fails,
/// which signs the session out.
pub struct NoRefresher;

impl NoRefresher {
    pub fn new() -> Self {
        NoRefresher
    }
}

impl Default for NoRefresher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Refresher for NoRefresher {
    fn get_name(&self) -> &str {
        "none"
    }

    async fn refresh(&self, _current_token: Option<&str>) -> Result<String, String> {
        Err("Token refresh is disabled".into())
    }
}

/// Takes a `RefreshConfig` and produces a shared refresher instance.
/// Refreshers that need a session credential read it from `backend`.
pub fn create_refresher(
    config: &RefreshConfig,
    storage: &StorageConfig,
    backend: Arc<dyn StorageBackend>,
) -> Arc<dyn Refresher> {
    match config {
        RefreshConfig::Disabled => {
            info!("Silent token refresh is disabled.");
            Arc::new(NoRefresher::new())
        }
        RefreshConfig::OpenId(cfg) => {
            let refresh_tokens = TokenStore::new(backend, storage.refresh_token_key.clone());
            Arc::new(OpenIdRefresher::new(cfg, refresh_tokens))
        }
    }
}
