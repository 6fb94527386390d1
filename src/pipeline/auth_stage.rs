use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderValue, AUTHORIZATION};
use tracing::{debug, warn};

use super::base::{Next, Stage};
use crate::error::PipelineError;
use crate::models::{GraphQLResponse, Operation};
use crate::store::TokenStore;

/// Sets `authorization: Bearer <token>` on the operation and remembers the
/// token it was sent with. Returns false when the token cannot be a header
/// value, leaving the operation anonymous.
pub fn attach_bearer(operation: &mut Operation, token: &str) -> bool {
    let mut value = match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(value) => value,
        Err(e) => {
            warn!("Stored token is not a valid header value: {}", e);
            return false;
        }
    };
    value.set_sensitive(true);
    operation.headers.insert(AUTHORIZATION, value);
    operation.bearer = Some(token.to_string());
    true
}

/// Removes any bearer credential from the operation.
pub fn detach_bearer(operation: &mut Operation) {
    operation.headers.remove(AUTHORIZATION);
    operation.bearer = None;
}

/// Attaches the current bearer token, if there is one.
pub struct AuthStage {
    tokens: Arc<TokenStore>,
}

impl AuthStage {
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        AuthStage { tokens }
    }
}

#[async_trait]
impl Stage for AuthStage {
    fn get_name(&self) -> &str {
        "auth"
    }

    async fn handle(
        &self,
        mut operation: Operation,
        next: Next<'_>,
    ) -> Result<GraphQLResponse, PipelineError> {
        match self.tokens.read().await {
            Ok(Some(token)) => {
                attach_bearer(&mut operation, &token);
            }
            Ok(None) => debug!(
                operation_id = %operation.id,
                "No bearer token; sending '{}' anonymously",
                operation.display_name()
            ),
            Err(e) => warn!(
                operation_id = %operation.id,
                "Could not read bearer token, sending anonymously: {}",
                e
            ),
        }
        next.run(operation).await
    }
}
