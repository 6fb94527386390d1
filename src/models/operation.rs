use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One GraphQL operation travelling through the pipeline.
///
/// Besides the wire payload it carries the request metadata stages attach
/// (headers), the bearer token the auth stage used, and whether the operation
/// was already re-submitted after a token refresh.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: Uuid,
    pub operation_name: Option<String>,
    pub query: String,
    pub variables: Value,
    pub headers: HeaderMap,
    /// Token attached by the auth stage, `None` when sent anonymously.
    pub bearer: Option<String>,
    /// Set once the operation has been re-submitted after a refresh.
    pub auth_retried: bool,
}

impl Operation {
    /// Creates an operation with empty variables and no metadata.
    pub fn new(query: impl Into<String>) -> Self {
        Operation {
            id: Uuid::new_v4(),
            operation_name: None,
            query: query.into(),
            variables: Value::Object(Map::new()),
            headers: HeaderMap::new(),
            bearer: None,
            auth_retried: false,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Name used in logs: the operation name, or "anonymous".
    pub fn display_name(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("anonymous")
    }

    /// Builds the JSON body sent to the endpoint.
    pub fn to_request(&self) -> GraphQLRequest {
        GraphQLRequest {
            query: self.query.clone(),
            variables: self.variables.clone(),
            operation_name: self.operation_name.clone(),
        }
    }
}

/// Wire body of a GraphQL POST.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GraphQLRequest {
    pub query: String,
    pub variables: Value,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}
