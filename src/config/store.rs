use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the bearer token is persisted between runs.
/// - backend: memory (process lifetime) or a JSON file.
/// - token_key / refresh_token_key: the slots inside the backend.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StorageConfig {
    #[serde(flatten)]
    pub backend: StorageBackendConfig,
    #[serde(default = "default_token_key")]
    pub token_key: String,
    #[serde(default = "default_refresh_token_key")]
    pub refresh_token_key: String,
}

/// The storage backends, selected via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type")]
pub enum StorageBackendConfig {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File(FileStorageConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct FileStorageConfig {
    pub path: String,
}

pub fn default_token_key() -> String {
    "accessToken".to_string()
}

pub fn default_refresh_token_key() -> String {
    "refreshToken".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: StorageBackendConfig::Memory,
            token_key: default_token_key(),
            refresh_token_key: default_refresh_token_key(),
        }
    }
}
