use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::refresher::Refresher;
use crate::config::OpenIdRefreshConfig;
use crate::store::TokenStore;

/// Refreshes the access token with an OAuth2 `refresh_token` grant.
///
/// The refresh token lives in its own storage slot. When the token endpoint
/// rotates it, the new one replaces the old.
pub struct OpenIdRefresher {
    config: OpenIdRefreshConfig,
    refresh_tokens: TokenStore,
    client: reqwest::Client,
}

impl OpenIdRefresher {
    pub fn new(config: &OpenIdRefreshConfig, refresh_tokens: TokenStore) -> Self {
        info!(
            "Creating OpenIdRefresher '{}' for endpoint '{}'",
            config.name, config.token_endpoint
        );
        Self {
            config: config.clone(),
            refresh_tokens,
            client: reqwest::Client::new(),
        }
    }

    /// The slot holding the session's refresh token.
    pub fn refresh_tokens(&self) -> &TokenStore {
        &self.refresh_tokens
    }
}

#[async_trait]
impl Refresher for OpenIdRefresher {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    async fn refresh(&self, _current_token: Option<&str>) -> Result<String, String> {
        let refresh_token = self
            .refresh_tokens
            .read()
            .await?
            .ok_or_else(|| "No refresh token available".to_string())?;

        debug!(
            "Exchanging refresh token for an access token at '{}'",
            self.config.token_endpoint
        );

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let mut request = self.client.post(&self.config.token_endpoint).form(&form);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(&self.config.client_id, Some(secret));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| format!("Failed to exchange refresh token: {}", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("Token endpoint rejected refresh: {}", status));
        }

        let json_body = resp
            .json::<Value>()
            .await
            .map_err(|e| format!("Failed to parse token response JSON: {}", e))?;

        let access_token = json_body
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| "Failed to retrieve access token from response".to_string())?
            .to_string();

        if let Some(rotated) = json_body.get("refresh_token").and_then(|t| t.as_str()) {
            if rotated != refresh_token {
                self.refresh_tokens.write(rotated).await?;
                debug!("Stored rotated refresh token");
            }
        }

        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use mockito::{Matcher, Server};
    use std::sync::Arc;

    fn create_test_config(url: String, secret: Option<&str>) -> OpenIdRefreshConfig {
        OpenIdRefreshConfig {
            name: "TestOpenID".to_string(),
            token_endpoint: format!("{}/token", url),
            client_id: "ecoverse-web".to_string(),
            client_secret: secret.map(str::to_string),
        }
    }

    async fn refresh_slot(value: Option<&str>) -> TokenStore {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()), "refreshToken");
        if let Some(value) = value {
            store.write(value).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "offline-1".into()),
                Matcher::UrlEncoded("client_id".into(), "ecoverse-web".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "new_access_token"}"#)
            .create_async()
            .await;

        let refresher = OpenIdRefresher::new(
            &create_test_config(server.url(), None),
            refresh_slot(Some("offline-1")).await,
        );
        let result = refresher.refresh(Some("expired")).await;
        m.assert_async().await;
        assert_eq!(result.unwrap(), "new_access_token");
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_stored() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .with_status(200)
            .with_body(r#"{"access_token": "a2", "refresh_token": "offline-2"}"#)
            .create_async()
            .await;

        let refresher = OpenIdRefresher::new(
            &create_test_config(server.url(), Some("secret")),
            refresh_slot(Some("offline-1")).await,
        );
        assert_eq!(refresher.refresh(None).await.unwrap(), "a2");
        assert_eq!(
            refresher.refresh_tokens().read().await.unwrap(),
            Some("offline-2".to_string())
        );
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails() {
        let refresher = OpenIdRefresher::new(
            &create_test_config("http://127.0.0.1:9".to_string(), None),
            refresh_slot(None).await,
        );
        let result = refresher.refresh(Some("expired")).await;
        assert_eq!(result.unwrap_err(), "No refresh token available");
    }

    #[tokio::test]
    async fn test_refresh_http_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let refresher = OpenIdRefresher::new(
            &create_test_config(server.url(), None),
            refresh_slot(Some("revoked")).await,
        );
        let result = refresher.refresh(Some("expired")).await;
        assert!(result.unwrap_err().contains("rejected refresh"));
    }

    #[tokio::test]
    async fn test_refresh_missing_access_token() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"token_type": "Bearer"}"#)
            .create_async()
            .await;

        let refresher = OpenIdRefresher::new(
            &create_test_config(server.url(), None),
            refresh_slot(Some("offline-1")).await,
        );
        let result = refresher.refresh(None).await;
        assert_eq!(
            result.unwrap_err(),
            "Failed to retrieve access token from response"
        );
    }
}
