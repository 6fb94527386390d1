use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::graphql::GraphQLConfig;
use super::logging::LoggingConfig;
use super::refresh::RefreshConfig;
use super::retry::RetryConfig;
use super::store::StorageConfig;

/// Prefix of environment variables overriding the YAML file,
/// e.g. `ECOVERSE_GRAPHQL__ENDPOINT`.
pub const ENV_PREFIX: &str = "ECOVERSE_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: endpoint, retry policy, token storage, refresh, logging.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub graphql: GraphQLConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub errors: ErrorSurfaceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bound of the user-visible error queue; unbounded when `max_records` is absent.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct ErrorSurfaceConfig {
    #[serde(default)]
    pub max_records: Option<usize>,
}

/// Builds the figment: version default, then the YAML file, then environment overrides.
pub fn figment(path: &str) -> Figment {
    Figment::from(Serialized::default("version", "1.0.0"))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from the YAML file at `path`, with `ECOVERSE_` environment overrides.
pub fn load_config(path: &str) -> Result<ConfigV1, String> {
    extract(figment(path))
}

/// Extracts a versioned config from any figment.
pub fn extract(figment: Figment) -> Result<ConfigV1, String> {
    let config = figment
        .extract::<Config>()
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    match config {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), String> {
    let schema = schema_for!(Config);
    let rendered = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("Failed to render schema: {}", e))?;
    println!("{}", rendered);
    Ok(())
}
