use thiserror::Error;
use wcl::{ClientError, FetchError, InvalidReportCode};

use crate::store::StoreError;

/// Run-level failures. Per-event problems never surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid report identifier: {0}")]
    InvalidCode(#[from] InvalidReportCode),

    #[error("An ingestion of report {0} is already running")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Report {0} not found at provider")]
    ReportNotFound(String),

    #[error("Fetching report metadata failed: {0}")]
    Meta(ClientError),

    #[error("Provider protocol error: {0}")]
    Protocol(String),

    #[error("Fight {fight_id} failed: {source}")]
    FightFailed {
        fight_id: i32,
        #[source]
        source: FightError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Classifies a client error raised outside any single fight.
    pub fn from_client(code: &str, err: ClientError) -> Self {
        match err {
            ClientError::Auth(msg) => Self::Auth(msg),
            ClientError::NotFound(_) => Self::ReportNotFound(code.to_string()),
            ClientError::Protocol(msg) => Self::Protocol(msg),
            other => Self::Meta(other),
        }
    }

    /// Lifts a fight failure that ends the run.
    pub fn from_fight(fight_id: i32, err: FightError) -> Self {
        match err {
            FightError::Fetch(FetchError {
                cause: ClientError::Auth(msg),
                ..
            }) => Self::Auth(msg),
            FightError::Store(StoreError::ReportMissing(id)) => {
                Self::Store(StoreError::ReportMissing(id))
            }
            source => Self::FightFailed { fight_id, source },
        }
    }
}

/// Why a single fight could not be ingested.
#[derive(Debug, Error)]
pub enum FightError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FightError {
    /// Failures that no later fight can succeed past.
    pub fn is_run_fatal(&self) -> bool {
        match self {
            Self::Fetch(e) => e.cause.is_auth(),
            Self::Store(StoreError::ReportMissing(_)) => true,
            Self::Store(_) => false,
        }
    }
}
