#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the ingestion run reacts to a fight that cannot be fetched or stored.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Skip the failing fight, record it in the summary and keep going.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "best_effort"))]
    BestEffort,
    /// Abort the whole run on the first fight failure.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "fail_fast"))]
    FailFast,
}

impl IngestMode {
    pub const ALL: &'static [IngestMode] = &[Self::BestEffort, Self::FailFast];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::FailFast => "fail_fast",
        }
    }
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid mode or status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
    valid: Vec<&'static str>,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid value '{}'. Valid values: {}",
            self.invalid,
            self.valid.join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for IngestMode {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best_effort" => Ok(Self::BestEffort),
            "fail_fast" => Ok(Self::FailFast),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
                valid: Self::ALL.iter().map(|m| m.as_str()).collect(),
            }),
        }
    }
}

/// Lifecycle of a persisted ingestion run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum RunStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Running"))]
    Running,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Succeeded"))]
    Succeeded,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Failed"))]
    Failed,
}

impl RunStatus {
    pub const ALL: &'static [RunStatus] = &[Self::Running, Self::Succeeded, Self::Failed];

    /// Returns true once the run can no longer change.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Running" => Ok(Self::Running),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
                valid: Self::ALL.iter().map(|r| r.as_str()).collect(),
            }),
        }
    }
}
