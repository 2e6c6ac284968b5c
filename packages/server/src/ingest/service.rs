use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span};
use wcl::ReportCode;

use super::coordinator::IngestionCoordinator;
use super::error::IngestError;
use super::registry::IngestRegistry;
use super::runs::IngestRunService;
use crate::store::ReportStore;

/// Acknowledgement for an accepted ingestion.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Accepted {
    #[schema(example = "AbC123xYz789QwEr")]
    pub report_code: String,
    pub run_id: i32,
}

/// Runs ingestions in the background, at most one per report code.
pub struct IngestService {
    db: DatabaseConnection,
    coordinator: Arc<IngestionCoordinator>,
    store: Arc<dyn ReportStore>,
    registry: IngestRegistry,
    tasks: TaskTracker,
}

impl IngestService {
    pub fn new(
        db: DatabaseConnection,
        coordinator: IngestionCoordinator,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            db,
            coordinator: Arc::new(coordinator),
            store,
            registry: IngestRegistry::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &IngestRegistry {
        &self.registry
    }

    /// Marks runs orphaned by an earlier process as failed. Call once at start-up.
    pub async fn recover(&self) -> Result<(), IngestError> {
        let failed = IngestRunService::new(&self.db)
            .fail_interrupted()
            .await
            .map_err(crate::store::StoreError::from)?;
        if failed > 0 {
            info!(runs = failed, "Marked interrupted ingestion runs as failed");
        }
        Ok(())
    }

    /// Validates the identifier, claims the code and starts the run in the background.
    ///
    /// Returns as soon as the run record exists. The outcome is only observable
    /// through the run record and the stored report.
    pub async fn trigger(&self, input: &str) -> Result<Accepted, IngestError> {
        let code = IngestionCoordinator::resolve(input)?;
        let claim = self.registry.try_begin(&code)?;

        let run = IngestRunService::new(&self.db)
            .start(code.as_str(), self.coordinator.mode())
            .await
            .map_err(crate::store::StoreError::from)?;
        let run_id = run.id;

        let coordinator = Arc::clone(&self.coordinator);
        let db = self.db.clone();
        let task_code = code.clone();
        let span = info_span!("ingest", report_code = %code, run_id);
        self.tasks.spawn(
            async move {
                let runs = IngestRunService::new(&db);
                let outcome = coordinator.run(&task_code, &claim).await;
                let recorded = match &outcome {
                    Ok(summary) => runs.finish_succeeded(run_id, summary).await,
                    Err(err) => runs.finish_failed(run_id, &err.to_string()).await,
                };
                if let Err(e) = recorded {
                    error!(error = %e, "Failed to record ingestion outcome");
                }
                // The code stays claimed until the outcome is recorded.
                drop(claim);
            }
            .instrument(span),
        );

        info!(report_code = %code, run_id, "Ingestion accepted");
        Ok(Accepted {
            report_code: code.to_string(),
            run_id,
        })
    }

    /// Deletes a stored report. Refused while the code is being ingested.
    pub async fn delete_report(&self, code: &ReportCode) -> Result<bool, IngestError> {
        let _claim = self.registry.try_begin(code)?;
        let existed = self.store.clear_report(code.as_str()).await?;
        if existed {
            info!(report_code = %code, "Deleted report");
        }
        Ok(existed)
    }

    /// Stops accepting work and waits for running ingestions to finish.
    pub async fn shutdown(&self) {
        self.tasks.close();
        info!(running = self.tasks.len(), "Waiting for running ingestions");
        self.tasks.wait().await;
    }
}
