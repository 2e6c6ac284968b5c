use std::time::Duration;

use common::RetryPolicy;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::config::WclConfig;
use crate::error::ClientError;
use crate::token::{AccessToken, TokenProvider};

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Outcome of a single HTTP exchange, before retry policy is applied.
enum Attempt<T> {
    Done(T),
    Unauthorized,
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
}

/// GraphQL transport with bearer auth, timeouts and bounded retries.
pub struct GraphQlClient {
    http: reqwest::Client,
    api_url: String,
    tokens: TokenProvider,
    retry: RetryPolicy,
}

impl GraphQlClient {
    pub fn new(http: reqwest::Client, config: &WclConfig) -> Self {
        Self {
            tokens: TokenProvider::new(http.clone(), config),
            http,
            api_url: config.api_url.clone(),
            retry: config.retry.clone(),
        }
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    /// Runs a query and deserializes its `data` member.
    ///
    /// Timeouts, connection failures, 429 and 5xx are retried per the policy, honouring
    /// `Retry-After`. A 401 forces one token refresh; a second 401 is an auth failure.
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ClientError> {
        let body = json!({ "query": query, "variables": variables });
        let mut attempt: u8 = 0;
        let mut refreshed = false;

        loop {
            attempt += 1;
            let token = self.tokens.get_token().await?;

            match self.send_once::<T>(&token, &body).await? {
                Attempt::Done(data) => return Ok(data),
                Attempt::Unauthorized if refreshed => {
                    return Err(ClientError::Auth(
                        "API rejected a freshly issued token".into(),
                    ));
                }
                Attempt::Unauthorized => {
                    warn!("API rejected access token, refreshing");
                    self.tokens.invalidate(&token).await;
                    refreshed = true;
                    attempt -= 1;
                }
                Attempt::Transient {
                    message,
                    retry_after,
                } => {
                    if !self.retry.allows_retry(attempt) {
                        error!(attempts = attempt, error = %message, "Retry budget exhausted");
                        return Err(ClientError::Exhausted {
                            attempts: attempt,
                            message,
                        });
                    }
                    let delay = retry_after
                        .map(|hint| self.retry.clamp_hint(hint))
                        .unwrap_or_else(|| self.retry.delay_for(attempt));
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        body: &Value,
    ) -> Result<Attempt<T>, ClientError> {
        let resp = match self
            .http
            .post(&self.api_url)
            .bearer_auth(token.secret())
            .json(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    format!("request failed: {e}")
                };
                return Ok(Attempt::Transient {
                    message,
                    retry_after: None,
                });
            }
        };

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized);
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Ok(Attempt::Transient {
                message: format!("API returned {status}"),
                retry_after,
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Protocol(format!(
                "Unexpected API status {status}: {text}"
            )));
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(Attempt::Transient {
                    message: format!("reading response body failed: {e}"),
                    retry_after: None,
                });
            }
        };
        let parsed: GraphQlResponse<T> = serde_json::from_slice(&bytes).map_err(|e| {
            error!(error = %e, "Unparseable GraphQL response");
            ClientError::Protocol(format!("Unparseable GraphQL response: {e}"))
        })?;

        if !parsed.errors.is_empty() {
            let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
            let joined = messages.join("; ");
            if messages.iter().all(|m| m.contains("does not exist")) {
                return Err(ClientError::NotFound(joined));
            }
            error!(errors = %joined, "GraphQL errors in response");
            return Err(ClientError::Protocol(joined));
        }

        parsed
            .data
            .map(Attempt::Done)
            .ok_or_else(|| ClientError::Protocol("GraphQL response without data".into()))
    }
}
