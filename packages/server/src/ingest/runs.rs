use chrono::Utc;
use common::{IngestMode, RunStatus};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use super::summary::IngestSummary;
use crate::entity::ingest_run;

/// Bookkeeping for ingestion run records.
pub struct IngestRunService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> IngestRunService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn start(&self, code: &str, mode: IngestMode) -> Result<ingest_run::Model, DbErr> {
        ingest_run::ActiveModel {
            report_code: Set(code.to_string()),
            status: Set(RunStatus::Running),
            mode: Set(mode),
            summary: Set(None),
            error: Set(None),
            started_at: Set(Utc::now()),
            finished_at: Set(None),
            ..Default::default()
        }
        .insert(self.conn)
        .await
    }

    pub async fn finish_succeeded(&self, id: i32, summary: &IngestSummary) -> Result<(), DbErr> {
        let summary =
            serde_json::to_value(summary).map_err(|e| DbErr::Custom(e.to_string()))?;
        ingest_run::ActiveModel {
            id: Set(id),
            status: Set(RunStatus::Succeeded),
            summary: Set(Some(summary)),
            finished_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(self.conn)
        .await?;
        Ok(())
    }

    pub async fn finish_failed(&self, id: i32, error: &str) -> Result<(), DbErr> {
        ingest_run::ActiveModel {
            id: Set(id),
            status: Set(RunStatus::Failed),
            error: Set(Some(error.to_string())),
            finished_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(self.conn)
        .await?;
        Ok(())
    }

    /// Fails every run still marked running. Only safe before any new run starts.
    pub async fn fail_interrupted(&self) -> Result<u64, DbErr> {
        let result = ingest_run::Entity::update_many()
            .col_expr(ingest_run::Column::Status, Expr::value(RunStatus::Failed))
            .col_expr(
                ingest_run::Column::Error,
                Expr::value("Interrupted by server shutdown"),
            )
            .col_expr(ingest_run::Column::FinishedAt, Expr::value(Utc::now()))
            .filter(ingest_run::Column::Status.eq(RunStatus::Running))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
