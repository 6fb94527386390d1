//! Extracts the `{supertype: [subtypes]}` map of abstract GraphQL types
//! (unions and interfaces) from the schema, for client-side type matching.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

pub const INTROSPECTION_QUERY: &str = r#"
{
  __schema {
    types {
      kind
      name
      possibleTypes {
        name
      }
    }
  }
}
"#;

pub type PossibleTypes = BTreeMap<String, Vec<String>>;

#[derive(Deserialize)]
struct NamedType {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaType {
    name: String,
    #[serde(default)]
    possible_types: Option<Vec<NamedType>>,
}

/// Reads `data.__schema.types` of an introspection response.
pub fn extract_possible_types(response: &Value) -> Result<PossibleTypes, String> {
    let types = response
        .pointer("/data/__schema/types")
        .ok_or_else(|| "Introspection response has no data.__schema.types".to_string())?;
    let types: Vec<SchemaType> = serde_json::from_value(types.clone())
        .map_err(|e| format!("Failed to parse introspection types: {}", e))?;

    Ok(types
        .into_iter()
        .filter_map(|supertype| {
            let subtypes = supertype.possible_types?;
            Some((
                supertype.name,
                subtypes.into_iter().map(|t| t.name).collect(),
            ))
        })
        .collect())
}

pub async fn fetch_possible_types(endpoint: &str) -> Result<PossibleTypes, String> {
    info!("Extracting from: {}", endpoint);
    let body = json!({"variables": {}, "query": INTROSPECTION_QUERY});
    let resp = reqwest::Client::new()
        .post(endpoint)
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("Failed to query '{}': {}", endpoint, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("Introspection failed with status {}", status));
    }
    let response = resp
        .json::<Value>()
        .await
        .map_err(|e| format!("Failed to parse introspection response: {}", e))?;
    extract_possible_types(&response)
}

/// Fetches the map and writes it as compact JSON to `output`.
pub async fn write_possible_types(endpoint: &str, output: &Path) -> Result<PossibleTypes, String> {
    let possible_types = fetch_possible_types(endpoint).await?;
    let json = serde_json::to_string(&possible_types)
        .map_err(|e| format!("Failed to serialize possible types: {}", e))?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    tokio::fs::write(output, json)
        .await
        .map_err(|e| format!("Error writing '{}': {}", output.display(), e))?;
    info!("Fragment types successfully extracted!");
    Ok(possible_types)
}
