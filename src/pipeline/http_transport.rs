use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::base::Transport;
use crate::error::PipelineError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{GraphQLResponse, Operation};

/// POSTs operations as JSON to the GraphQL endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    debug_query: bool,
    metrics: Metrics,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, metrics: Metrics) -> Self {
        let endpoint = endpoint.into();
        info!("Creating HttpTransport for endpoint '{}'", endpoint);
        HttpTransport {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
            debug_query: false,
            metrics,
        }
    }

    /// Logs every operation's query and variables before sending it.
    pub fn with_debug_query(mut self, debug_query: bool) -> Self {
        self.debug_query = debug_query;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, operation: &Operation) -> Result<GraphQLResponse, PipelineError> {
        let request = self
            .client
            .post(&self.endpoint)
            .headers(operation.headers.clone())
            .json(&operation.to_request());

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to fetch: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            // GraphQL servers often explain a failed status in the body.
            let errors = serde_json::from_str::<GraphQLResponse>(&body)
                .map(|r| r.errors)
                .unwrap_or_default();
            return Err(PipelineError::Status {
                status: status.as_u16(),
                body,
                errors,
            });
        }

        serde_json::from_str::<GraphQLResponse>(&body).map_err(|e| PipelineError::Decode {
            status: status.as_u16(),
            message: e.to_string(),
        })
    }
}

fn attempt_label(result: &Result<GraphQLResponse, PipelineError>) -> &'static str {
    match result {
        Ok(response) if response.has_errors() => "graphql_error",
        Ok(_) => "success",
        Err(PipelineError::Timeout(_)) => "timeout",
        Err(PipelineError::Status { .. }) => "http_error",
        Err(PipelineError::Decode { .. }) => "decode_error",
        Err(_) => "network_error",
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn get_name(&self) -> &str {
        "http"
    }

    async fn send(&self, operation: Operation) -> Result<GraphQLResponse, PipelineError> {
        if self.debug_query {
            info!(
                operation_id = %operation.id,
                operation_name = operation.display_name(),
                variables = %operation.variables,
                "GraphQL query: {}",
                operation.query
            );
        }

        let result = match tokio::time::timeout(self.timeout, self.attempt(&operation)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(self.timeout.as_millis() as u64)),
        };

        let label = attempt_label(&result);
        self.metrics.record_transport_attempt(label);
        debug!(
            operation_id = %operation.id,
            endpoint = %self.endpoint,
            result = label,
            "Sent '{}'",
            operation.display_name()
        );
        result
    }
}
