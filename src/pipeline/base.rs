use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::{GraphQLResponse, Operation};

/// Sends an operation to the endpoint; terminates the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    fn get_name(&self) -> &str;
    async fn send(&self, operation: Operation) -> Result<GraphQLResponse, PipelineError>;
}

/// A middleware stage. It may change the operation before calling `next`,
/// inspect or replace the result, or call `next` more than once.
#[async_trait]
pub trait Stage: Send + Sync {
    fn get_name(&self) -> &str;
    async fn handle(
        &self,
        operation: Operation,
        next: Next<'_>,
    ) -> Result<GraphQLResponse, PipelineError>;
}

/// Continuation over the stages after the current one, ending in the transport.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Stage>], transport: &'a dyn Transport) -> Self {
        Next { stages, transport }
    }

    /// Passes the operation to the next stage, or to the transport after the last one.
    pub async fn run(self, operation: Operation) -> Result<GraphQLResponse, PipelineError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(operation, Next::new(rest, self.transport))
                    .await
            }
            None => self.transport.send(operation).await,
        }
    }
}

/// An ordered chain of stages, fixed at construction.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>, transport: Arc<dyn Transport>) -> Self {
        Pipeline { stages, transport }
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.get_name()).collect()
    }

    pub async fn execute(&self, operation: Operation) -> Result<GraphQLResponse, PipelineError> {
        Next::new(&self.stages, self.transport.as_ref())
            .run(operation)
            .await
    }
}
