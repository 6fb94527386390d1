#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use ecoverse_client::client::GraphQLClient;
use ecoverse_client::config::{
    ConfigV1, FileStorageConfig, GraphQLConfig, OpenIdRefreshConfig, RefreshConfig, RetryConfig,
    StorageBackendConfig, StorageConfig,
};
use ecoverse_client::startup::build_client;
use serde_json::{json, Value};

/// Config pointing at a mock server, with fast retries.
pub fn test_config(server_url: &str) -> ConfigV1 {
    ConfigV1 {
        graphql: GraphQLConfig {
            endpoint: Some(format!("{}/graphql", server_url)),
            request_timeout_ms: 5_000,
            ..GraphQLConfig::default()
        },
        retry: RetryConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            max_attempts: 3,
            ..RetryConfig::default()
        },
        ..ConfigV1::default()
    }
}

/// Adds an OpenID refresher against `{server_url}/token` and file-backed
/// token storage at `path`.
pub fn with_refresh(mut config: ConfigV1, server_url: &str, path: &Path) -> ConfigV1 {
    config.refresh = RefreshConfig::OpenId(OpenIdRefreshConfig {
        name: "test-openid".to_string(),
        token_endpoint: format!("{}/token", server_url),
        client_id: "ecoverse-web".to_string(),
        client_secret: None,
    });
    config.storage = StorageConfig {
        backend: StorageBackendConfig::File(FileStorageConfig {
            path: path.to_string_lossy().into_owned(),
        }),
        ..StorageConfig::default()
    };
    config
}

/// Writes persisted tokens as a previous run would have left them.
pub fn seed_tokens(path: &Path, access: &str, refresh: &str) {
    let slots = json!({"accessToken": access, "refreshToken": refresh});
    std::fs::write(path, slots.to_string()).expect("failed to seed token file");
}

pub async fn build_test_client(config: ConfigV1) -> GraphQLClient {
    build_client(Arc::new(config))
        .await
        .expect("failed to build client")
}

pub async fn sign_in(client: &GraphQLClient, token: &str) {
    let session = &client.context().session;
    session.begin_sign_in().expect("sign-in should start");
    session
        .complete_sign_in(token)
        .await
        .expect("sign-in should complete");
}

pub fn me_data() -> Value {
    json!({"data": {"me": {"id": "u1"}}})
}

pub fn error_body(code: &str, message: &str) -> Value {
    json!({
        "data": null,
        "errors": [{"message": message, "extensions": {"code": code}}]
    })
}
