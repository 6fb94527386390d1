use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backoff policy of the retry stage.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Total attempts, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// Status codes treated as permanent failures.
    #[serde(default = "default_non_retryable_statuses")]
    pub non_retryable_statuses: Vec<u16>,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    25
}

fn default_jitter() -> bool {
    true
}

fn default_non_retryable_statuses() -> Vec<u16> {
    vec![400, 500]
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
            non_retryable_statuses: default_non_retryable_statuses(),
        }
    }
}
