use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Error code the API uses for a missing or expired bearer token.
pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";

/// Wire body of a GraphQL response: `{data, errors?}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub errors: Vec<GraphQLError>,
}

/// Some servers send `"errors": null` on success.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<GraphQLError>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<GraphQLError>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GraphQLResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when any error carries the `UNAUTHENTICATED` code.
    pub fn is_unauthenticated(&self) -> bool {
        self.errors.iter().any(GraphQLError::is_unauthenticated)
    }
}

/// A single entry of the `errors` array.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GraphQLError {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    /// Locations, path and anything else the server sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        GraphQLError {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert("code".to_string(), Value::from(code));
        self
    }

    /// The `extensions.code` value, if present and a string.
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(Value::as_str)
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.code() == Some(UNAUTHENTICATED)
    }
}
