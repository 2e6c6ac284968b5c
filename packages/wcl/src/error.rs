use common::EventKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Credentials or token rejected. Never retried.
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// Transient failures (timeouts, connection errors, 429, 5xx) outlasted the retry budget.
    #[error("Request failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u8, message: String },

    /// The provider answered with something we cannot interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Report not found: {0}")]
    NotFound(String),
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// A failed cursor walk for one fight and event kind.
#[derive(Debug, Error)]
#[error("Fetching {kind} events for fight {fight_id} failed: {cause}")]
pub struct FetchError {
    pub fight_id: i32,
    pub kind: EventKind,
    #[source]
    pub cause: ClientError,
}

impl FetchError {
    pub fn new(fight_id: i32, kind: EventKind, cause: ClientError) -> Self {
        Self {
            fight_id,
            kind,
            cause,
        }
    }
}
