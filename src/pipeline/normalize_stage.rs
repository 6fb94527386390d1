use async_trait::async_trait;
use tracing::debug;

use super::base::{Next, Stage};
use crate::error::PipelineError;
use crate::models::{GraphQLResponse, Operation};
use crate::utils::value::{has_reserved_keys, strip_reserved_keys};

/// Removes client-side metadata keys (`__typename`, `_id`, `$…`) from the
/// variables; the server schema rejects them.
pub struct NormalizeStage;

impl NormalizeStage {
    pub fn new() -> Self {
        NormalizeStage
    }
}

impl Default for NormalizeStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for NormalizeStage {
    fn get_name(&self) -> &str {
        "normalize"
    }

    async fn handle(
        &self,
        mut operation: Operation,
        next: Next<'_>,
    ) -> Result<GraphQLResponse, PipelineError> {
        if has_reserved_keys(&operation.variables) {
            debug!(operation_id = %operation.id, "Stripping reserved keys from variables");
            operation.variables = strip_reserved_keys(std::mem::take(&mut operation.variables));
        }
        next.run(operation).await
    }
}
