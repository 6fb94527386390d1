//! Exponential backoff with jitter for failed transmissions.
//!
//! Delay before retry `n` (1-based) is `initial * 2^(n-1)`, capped at
//! `max_delay`. With jitter the delay is scaled by a random factor in
//! `[0.5, 1.0]`, then clamped so it is never shorter than the previous delay.
//! Delays are non-decreasing and never exceed the cap.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use super::base::{Next, Stage};
use crate::config::RetryConfig;
use crate::error::PipelineError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{GraphQLResponse, Operation};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub jitter: bool,
    pub non_retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        RetryPolicy {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts.max(1),
            jitter: config.jitter,
            non_retryable_statuses: config.non_retryable_statuses.clone(),
        }
    }

    /// Failures without a status (network, timeout) are always retried.
    pub fn should_retry(&self, error: &PipelineError) -> bool {
        match error.status() {
            Some(status) => !self.non_retryable_statuses.contains(&status),
            None => true,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            retries: 0,
            last: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Delay sequence of one operation's retries.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    retries: u32,
    last: Duration,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        self.retries += 1;
        let max_ms = self.policy.max_delay.as_millis() as u64;
        let factor = 1u64
            .checked_shl(self.retries - 1)
            .unwrap_or(u64::MAX);
        let base_ms = (self.policy.initial_delay.as_millis() as u64)
            .saturating_mul(factor)
            .min(max_ms);
        let base = Duration::from_millis(base_ms);

        let delay = if self.policy.jitter {
            base.mul_f64(rand::rng().random_range(0.5..=1.0))
        } else {
            base
        };
        let delay = delay.max(self.last).min(self.policy.max_delay);
        self.last = delay;
        delay
    }
}

pub struct RetryStage {
    policy: RetryPolicy,
    metrics: Metrics,
}

impl RetryStage {
    pub fn new(policy: RetryPolicy, metrics: Metrics) -> Self {
        RetryStage { policy, metrics }
    }
}

#[async_trait]
impl Stage for RetryStage {
    fn get_name(&self) -> &str {
        "retry"
    }

    async fn handle(
        &self,
        operation: Operation,
        next: Next<'_>,
    ) -> Result<GraphQLResponse, PipelineError> {
        let mut backoff = self.policy.backoff();
        let mut attempt = 1;
        loop {
            let error = match next.run(operation.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            if !self.policy.should_retry(&error) {
                debug!(
                    operation_id = %operation.id,
                    "Not retrying '{}': {}",
                    operation.display_name(),
                    error
                );
                return Err(error);
            }
            if attempt >= self.policy.max_attempts {
                warn!(
                    operation_id = %operation.id,
                    attempts = attempt,
                    "Giving up on '{}': {}",
                    operation.display_name(),
                    error
                );
                return Err(error);
            }
            let delay = backoff.next_delay();
            self.metrics.record_retry();
            debug!(
                operation_id = %operation.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying '{}' after failure: {}",
                operation.display_name(),
                error
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
