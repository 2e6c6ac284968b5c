use common::{IngestMode, RunStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ingestion attempt and its outcome.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingest_run")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub report_code: String,

    pub status: RunStatus,
    pub mode: IngestMode,

    /// Serialized `IngestSummary`, set when the run succeeds.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub summary: Option<Json>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    pub started_at: DateTimeUtc,
    pub finished_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
