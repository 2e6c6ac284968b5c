use common::RetryPolicy;
use serde::Deserialize;

/// Connection settings for the Warcraft Logs v2 API.
#[derive(Debug, Deserialize, Clone)]
pub struct WclConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth2 token endpoint. Default: the public WCL endpoint.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// GraphQL client endpoint. Default: the public WCL endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Per-request timeout, applied to token and query calls. Default: 30.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Events requested per page. Default: 10000 (the provider maximum).
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// A token is treated as expired this long before its real expiry. Default: 60.
    #[serde(default = "default_token_expiry_buffer_secs")]
    pub token_expiry_buffer_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_token_url() -> String {
    "https://www.warcraftlogs.com/oauth/token".into()
}
fn default_api_url() -> String {
    "https://www.warcraftlogs.com/api/v2/client".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_page_limit() -> u32 {
    10_000
}
fn default_token_expiry_buffer_secs() -> u64 {
    60
}

impl WclConfig {
    /// Config pointing at the public endpoints with every optional setting defaulted.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: default_token_url(),
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            page_limit: default_page_limit(),
            token_expiry_buffer_secs: default_token_expiry_buffer_secs(),
            retry: RetryPolicy::default(),
        }
    }
}
