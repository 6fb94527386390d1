//! Failure type delivered to callers of the pipeline.

use crate::models::GraphQLError;

/// Why an operation was rejected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Network(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    /// The endpoint answered with a non-success status.
    #[error("response not successful: received status code {status}")]
    Status {
        status: u16,
        body: String,
        errors: Vec<GraphQLError>,
    },
    #[error("failed to parse response (status {status}): {message}")]
    Decode { status: u16, message: String },
    /// The response carried GraphQL errors.
    #[error("{}", join_messages(.0))]
    GraphQL(Vec<GraphQLError>),
    #[error("not authenticated")]
    Unauthenticated,
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

impl PipelineError {
    /// HTTP status of the failure, if the endpoint produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::Status { status, .. } | PipelineError::Decode { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// GraphQL errors carried by the failure, if any.
    pub fn graphql_errors(&self) -> &[GraphQLError] {
        match self {
            PipelineError::Status { errors, .. } | PipelineError::GraphQL(errors) => errors,
            _ => &[],
        }
    }

    /// True for failures that happened below the GraphQL layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PipelineError::Network(_)
                | PipelineError::Timeout(_)
                | PipelineError::Status { .. }
                | PipelineError::Decode { .. }
        )
    }
}

fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
