use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::metrics::MetricsRecorder;
use crate::models::{GraphQLResponse, Operation};
use crate::pipeline::Pipeline;
use crate::state::ClientContext;

/// Entry point for callers: runs operations through the pipeline.
pub struct GraphQLClient {
    context: ClientContext,
    pipeline: Pipeline,
}

impl GraphQLClient {
    pub fn new(context: ClientContext, pipeline: Pipeline) -> Self {
        GraphQLClient { context, pipeline }
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Runs the operation and returns its `data`.
    pub async fn execute(&self, operation: Operation) -> Result<Value, PipelineError> {
        self.execute_raw(operation)
            .await
            .map(|response| response.data.unwrap_or(Value::Null))
    }

    /// Runs the operation and returns the whole response.
    pub async fn execute_raw(&self, operation: Operation) -> Result<GraphQLResponse, PipelineError> {
        let started = Instant::now();
        let id = operation.id;
        let name = operation.display_name().to_string();

        let result = self.pipeline.execute(operation).await;

        let label = match &result {
            Ok(_) => "success",
            Err(PipelineError::GraphQL(_)) => "graphql_error",
            Err(PipelineError::Unauthenticated) | Err(PipelineError::RefreshFailed(_)) => {
                "unauthenticated"
            }
            Err(_) => "network_error",
        };
        let elapsed = started.elapsed().as_secs_f64();
        self.context.metrics.record_operation(label, elapsed);

        match &result {
            Ok(_) => debug!(operation_id = %id, elapsed, "'{}' succeeded", name),
            Err(e) => warn!(operation_id = %id, elapsed, result = label, "'{}' failed: {}", name, e),
        }
        result
    }

    /// Convenience wrapper for an anonymous operation.
    pub async fn query(&self, query: &str, variables: Value) -> Result<Value, PipelineError> {
        self.execute(Operation::new(query).with_variables(variables))
            .await
    }
}
