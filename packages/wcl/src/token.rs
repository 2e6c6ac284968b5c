use std::time::{Duration, Instant};

use common::RetryPolicy;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::WclConfig;
use crate::error::ClientError;

/// A bearer credential together with the instant it stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Client-credentials token cache.
///
/// The cache lock is held across the refresh call, so concurrent callers that find the
/// token stale queue behind a single outbound request and then reuse its result.
pub struct TokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    expiry_buffer: Duration,
    retry: RetryPolicy,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, config: &WclConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            expiry_buffer: Duration::from_secs(config.token_expiry_buffer_secs),
            retry: config.retry.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached token, refreshing it first when absent or expired.
    pub async fn get_token(&self) -> Result<AccessToken, ClientError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.clone());
        }

        let token = self.request_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token if it is still the one the caller saw rejected.
    ///
    /// A token refreshed by someone else in the meantime is kept.
    pub async fn invalidate(&self, stale: &AccessToken) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref() == Some(stale) {
            debug!("Invalidating rejected access token");
            *cached = None;
        }
    }

    async fn request_token(&self) -> Result<AccessToken, ClientError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let result = self
                .http
                .post(&self.token_url)
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&[("grant_type", "client_credentials")])
                .send()
                .await;

            let message = match result {
                Ok(resp) if resp.status().is_success() => {
                    let body: TokenResponse = resp.json().await.map_err(|e| {
                        ClientError::Protocol(format!("Malformed token response: {e}"))
                    })?;
                    let lifetime = Duration::from_secs(body.expires_in)
                        .saturating_sub(self.expiry_buffer);
                    info!(expires_in = body.expires_in, "Obtained new access token");
                    return Ok(AccessToken {
                        value: body.access_token,
                        expires_at: Instant::now() + lifetime,
                    });
                }
                Ok(resp)
                    if matches!(
                        resp.status(),
                        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                    ) =>
                {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    return Err(ClientError::Auth(format!(
                        "token endpoint returned {status}: {text}"
                    )));
                }
                Ok(resp)
                    if resp.status() == StatusCode::TOO_MANY_REQUESTS
                        || resp.status().is_server_error() =>
                {
                    format!("token endpoint returned {}", resp.status())
                }
                Ok(resp) => {
                    return Err(ClientError::Protocol(format!(
                        "Unexpected token endpoint status {}",
                        resp.status()
                    )));
                }
                Err(e) => format!("token request failed: {e}"),
            };

            if !self.retry.allows_retry(attempt) {
                return Err(ClientError::Exhausted {
                    attempts: attempt,
                    message,
                });
            }
            let delay = self.retry.delay_for(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "Token request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> WclConfig {
        let mut config = WclConfig::new("id", "secret");
        config.token_url = format!("{}/oauth/token", server.uri());
        config.retry = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        config
    }

    fn token_body(token: &str, expires_in: u64) -> serde_json::Value {
        serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": expires_in
        })
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(reqwest::Client::new(), &config_for(&server));
        let first = provider.get_token().await.unwrap();
        let second = provider.get_token().await.unwrap();
        assert_eq!(first.secret(), "tok-1");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("tok-shared", 3600))
                    .set_delay(Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = Arc::new(TokenProvider::new(
            reqwest::Client::new(),
            &config_for(&server),
        ));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.get_token().await })
            })
            .collect();
        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.secret(), "tok-shared");
        }
    }

    #[tokio::test]
    async fn test_token_within_buffer_is_refreshed() {
        let server = MockServer::start().await;
        // expires_in below the 60s buffer: every call sees a stale token.
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short", 30)))
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(reqwest::Client::new(), &config_for(&server));
        provider.get_token().await.unwrap();
        provider.get_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(reqwest::Client::new(), &config_for(&server));
        let err = provider.get_token().await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(reqwest::Client::new(), &config_for(&server));
        let err = provider.get_token().await.unwrap_err();
        assert!(matches!(err, ClientError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_invalidate_only_clears_matching_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(reqwest::Client::new(), &config_for(&server));
        let token = provider.get_token().await.unwrap();

        let unrelated = AccessToken {
            value: "other".into(),
            expires_at: Instant::now() + Duration::from_secs(60),
        };
        provider.invalidate(&unrelated).await;
        assert_eq!(provider.get_token().await.unwrap(), token);

        provider.invalidate(&token).await;
        provider.get_token().await.unwrap();
    }
}
