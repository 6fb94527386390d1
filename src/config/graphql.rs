use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Endpoint used by production builds served next to the API.
pub const PRODUCTION_ENDPOINT: &str = "/graphql";
/// Endpoint used by every other environment.
pub const DEVELOPMENT_ENDPOINT: &str = "http://localhost:4000/graphql";

/// Settings of the GraphQL endpoint and the transport talking to it.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct GraphQLConfig {
    /// Explicit endpoint; derived from `environment` when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Log every operation's query and variables.
    #[serde(default)]
    pub debug_query: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        GraphQLConfig {
            endpoint: None,
            environment: default_environment(),
            debug_query: false,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl GraphQLConfig {
    /// The configured endpoint, or the default for the environment.
    pub fn resolve_endpoint(&self) -> String {
        match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
            _ => default_endpoint(&self.environment).to_string(),
        }
    }
}

/// Default endpoint for an environment name.
pub fn default_endpoint(environment: &str) -> &'static str {
    if environment.eq_ignore_ascii_case("production") {
        PRODUCTION_ENDPOINT
    } else {
        DEVELOPMENT_ENDPOINT
    }
}
