//! Generates the runtime configuration script for the web front-end.
//!
//! Every environment variable starting with the prefix is copied into a
//! `window._env_ = {…}` assignment. The GraphQL endpoint falls back to the
//! default of the target environment when not set.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use tracing::{debug, info};

use crate::config::default_endpoint;

pub const DEFAULT_PREFIX: &str = "REACT_APP_";
pub const CONFIG_FILE_NAME: &str = "env-config.js";
const CONFIG_TEXT: &str = "window._env_ = ";

/// Name of the endpoint variable for a prefix, e.g. `REACT_APP_GRAPHQL_ENDPOINT`.
pub fn endpoint_key(prefix: &str) -> String {
    format!("{}GRAPHQL_ENDPOINT", prefix)
}

/// Picks the prefixed variables out of `vars` and fills in the endpoint.
pub fn collect_configuration<I>(vars: I, prefix: &str, environment: &str) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut configuration: BTreeMap<String, String> = vars
        .into_iter()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect();

    let key = endpoint_key(prefix);
    let missing = configuration.get(&key).map_or(true, |v| v.is_empty());
    if missing {
        configuration.insert(key, default_endpoint(environment).to_string());
    }
    configuration
}

/// Keeps the variables whose name and value are valid UTF-8.
pub fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!("Skipping non UTF-8 environment variable {:?}", key);
                None
            }
        })
}

pub fn render_configuration(configuration: &BTreeMap<String, String>) -> Result<String, String> {
    let json = serde_json::to_string_pretty(configuration)
        .map_err(|e| format!("Failed to serialize configuration: {}", e))?;
    Ok(format!("{}{}", CONFIG_TEXT, json))
}

/// Reads the process environment and writes the script to `output`.
pub async fn build_configuration(
    prefix: &str,
    environment: &str,
    output: &Path,
) -> Result<BTreeMap<String, String>, String> {
    info!("Building for : '{}'", environment);
    let configuration = collect_configuration(utf8_vars(std::env::vars_os()), prefix, environment);
    for (key, value) in &configuration {
        info!("{}: {}", key, value);
    }

    let script = render_configuration(&configuration)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    tokio::fs::write(output, script)
        .await
        .map_err(|e| format!("Failed to write '{}': {}", output.display(), e))?;
    info!("Wrote {}", output.display());
    Ok(configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEVELOPMENT_ENDPOINT, PRODUCTION_ENDPOINT};

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_only_prefixed_variables_are_kept() {
        let configuration = collect_configuration(
            vars(&[("APP_AUTH_REALM", "ecoverse"), ("HOME", "/root"), ("PATH", "/bin")]),
            "APP_",
            "development",
        );
        assert_eq!(configuration.get("APP_AUTH_REALM").unwrap(), "ecoverse");
        assert!(!configuration.contains_key("HOME"));
        assert_eq!(configuration.len(), 2);
    }

    #[test]
    fn test_endpoint_defaults_per_environment() {
        let dev = collect_configuration(vars(&[]), "APP_", "development");
        assert_eq!(dev["APP_GRAPHQL_ENDPOINT"], DEVELOPMENT_ENDPOINT);
        let prod = collect_configuration(vars(&[]), "APP_", "production");
        assert_eq!(prod["APP_GRAPHQL_ENDPOINT"], PRODUCTION_ENDPOINT);
    }

    #[test]
    fn test_explicit_endpoint_wins() {
        let configuration = collect_configuration(
            vars(&[("APP_GRAPHQL_ENDPOINT", "https://api.example.org/graphql")]),
            "APP_",
            "production",
        );
        assert_eq!(
            configuration["APP_GRAPHQL_ENDPOINT"],
            "https://api.example.org/graphql"
        );
    }

    #[test]
    fn test_render_is_script_assignment() {
        let configuration = collect_configuration(vars(&[]), "APP_", "production");
        let script = render_configuration(&configuration).unwrap();
        assert_eq!(
            script,
            "window._env_ = {\n  \"APP_GRAPHQL_ENDPOINT\": \"/graphql\"\n}"
        );
    }

    #[test]
    fn test_default_prefix_keeps_original_keys() {
        let configuration = collect_configuration(
            vars(&[("REACT_APP_AUTH_REALM", "ecoverse")]),
            DEFAULT_PREFIX,
            "production",
        );
        assert_eq!(configuration["REACT_APP_AUTH_REALM"], "ecoverse");
        assert_eq!(configuration["REACT_APP_GRAPHQL_ENDPOINT"], PRODUCTION_ENDPOINT);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("REACT_APP_KEPT"), OsString::from("yes")),
            (OsString::from_vec(b"UNRELATED_\xff".to_vec()), OsString::from("x")),
            (OsString::from("REACT_APP_BAD_VALUE"), OsString::from_vec(vec![0x66, 0xff])),
        ];
        let kept: Vec<(String, String)> = utf8_vars(vars).collect();
        assert_eq!(kept, vec![("REACT_APP_KEPT".to_string(), "yes".to_string())]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_survives_non_utf8_environment() {
        use std::os::unix::ffi::OsStrExt;

        let name = std::ffi::OsStr::from_bytes(b"ECOVERSE_TEST_NON_UTF8_\xff");
        std::env::set_var(name, "x");
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join(CONFIG_FILE_NAME);
        let result = build_configuration("ECOVERSE_TEST_NON_UTF8_PREFIX_", "development", &output).await;
        std::env::remove_var(name);

        let configuration = result.unwrap();
        assert_eq!(
            configuration["ECOVERSE_TEST_NON_UTF8_PREFIX_GRAPHQL_ENDPOINT"],
            DEVELOPMENT_ENDPOINT
        );
    }

    #[tokio::test]
    async fn test_build_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("public").join(CONFIG_FILE_NAME);
        let configuration = build_configuration("ECOVERSE_TEST_UNSET_PREFIX_", "production", &output)
            .await
            .unwrap();
        assert_eq!(configuration.len(), 1);

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("window._env_ = {"));
        assert!(written.contains("\"ECOVERSE_TEST_UNSET_PREFIX_GRAPHQL_ENDPOINT\": \"/graphql\""));
    }
}
