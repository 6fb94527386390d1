use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How an expired bearer token is silently replaced.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema, Default)]
#[serde(tag = "type")]
pub enum RefreshConfig {
    /// No silent refresh; an expired token signs the session out.
    #[serde(rename = "none")]
    #[default]
    Disabled,
    #[serde(rename = "openid")]
    OpenId(OpenIdRefreshConfig),
}

/// OAuth2 refresh_token grant against an OpenID token endpoint.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct OpenIdRefreshConfig {
    pub name: String,
    pub token_endpoint: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}
