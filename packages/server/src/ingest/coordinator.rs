//! One report ingestion, from code to stored rows.
//!
//! The run walks `Resolving → Clearing → FetchingMeta → FetchingFights → Persisting → Done`
//! and any error lands in `Failed`. Clearing commits before anything new is written, so a
//! report is either gone, partially repopulated or fully repopulated. Old and new rows
//! never coexist.

use std::sync::Arc;

use common::{EventKind, IngestMode};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};
use wcl::{FightMeta, ReportCode, ReportSource};

use super::error::{FightError, IngestError};
use super::normalizer::{ActorDirectory, NormalizeContext, Normalized, normalize};
use super::phase::IngestPhase;
use super::registry::InFlight;
use super::summary::{FightFailure, FightOutcome, IngestSummary};
use crate::config::IngestConfig;
use crate::store::{NewFight, NewPlayer, NewReport, ReportStore, StoredReport};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub mode: IngestMode,
    /// Upper bound on fights fetched at once.
    pub fight_concurrency: usize,
    /// Kinds walked for every fight, in this order.
    pub kinds: Vec<EventKind>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            mode: IngestMode::default(),
            fight_concurrency: 4,
            kinds: EventKind::ALL.to_vec(),
        }
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            mode: config.mode,
            fight_concurrency: config.fight_concurrency.max(1),
            kinds: config.event_kinds.clone(),
        }
    }
}

pub struct IngestionCoordinator {
    source: Arc<dyn ReportSource>,
    store: Arc<dyn ReportStore>,
    options: IngestOptions,
}

impl IngestionCoordinator {
    pub fn new(
        source: Arc<dyn ReportSource>,
        store: Arc<dyn ReportStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    pub fn mode(&self) -> IngestMode {
        self.options.mode
    }

    /// `Resolving`: syntax check of a raw code or report URL.
    pub fn resolve(input: &str) -> Result<ReportCode, IngestError> {
        Ok(ReportCode::parse(input)?)
    }

    /// Runs one ingestion for a code the caller holds exclusively.
    #[instrument(skip(self, claim), fields(report_code = %code, mode = %self.options.mode))]
    pub async fn run(
        &self,
        code: &ReportCode,
        claim: &InFlight,
    ) -> Result<IngestSummary, IngestError> {
        match self.drive(code, claim).await {
            Ok(summary) => {
                claim.advance(IngestPhase::Done);
                info!(
                    fights = summary.fights_processed,
                    fights_skipped = summary.fights_skipped.len(),
                    events = summary.events_stored.total(),
                    skipped = summary.events_skipped,
                    malformed = summary.events_malformed,
                    "Ingestion finished"
                );
                Ok(summary)
            }
            Err(err) => {
                claim.advance(IngestPhase::Failed);
                error!(phase = ?claim.phase(), error = %err, "Ingestion failed");
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        code: &ReportCode,
        claim: &InFlight,
    ) -> Result<IngestSummary, IngestError> {
        let mut summary = IngestSummary::new(code.as_str(), self.options.mode);

        // Rejected credentials must fail the run before anything is deleted.
        self.source
            .verify_access()
            .await
            .map_err(|e| IngestError::from_client(code.as_str(), e))?;

        claim.advance(IngestPhase::Clearing);
        summary.cleared_previous = self.store.clear_report(code.as_str()).await?;

        claim.advance(IngestPhase::FetchingMeta);
        let meta = self
            .source
            .fetch_report_meta(code)
            .await
            .map_err(|e| IngestError::from_client(code.as_str(), e))?;
        let stored = self
            .store
            .create_report(NewReport::from(&meta), NewPlayer::from_roster(meta.actors()))
            .await?;
        let actors = ActorDirectory::new(stored.players.clone(), meta.actors());

        let total = meta.fights.len();
        summary.fights_total = total;
        claim.advance(IngestPhase::FetchingFights {
            completed: 0,
            total,
        });

        let fight_futures: Vec<_> = meta
            .fights
            .iter()
            .map(|fight| {
                let stored = &stored;
                let actors = &actors;
                async move { (fight, self.ingest_fight(code, fight, stored, actors).await) }
            })
            .collect();
        let mut results =
            stream::iter(fight_futures).buffer_unordered(self.options.fight_concurrency.max(1));

        let mut completed = 0;
        while let Some((fight, result)) = results.next().await {
            completed += 1;
            claim.advance(IngestPhase::FetchingFights { completed, total });
            match result {
                Ok(outcome) => summary.absorb(outcome),
                Err(err) if err.is_run_fatal() || self.options.mode == IngestMode::FailFast => {
                    // Dropping `results` cancels fights still in flight; their
                    // transactions roll back.
                    return Err(IngestError::from_fight(fight.id, err));
                }
                Err(err) => {
                    warn!(fight_id = fight.id, error = %err, "Skipping fight");
                    summary.fights_skipped.push(FightFailure {
                        fight_id: fight.id,
                        name: fight.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        drop(results);

        claim.advance(IngestPhase::Persisting);
        self.store
            .finalize_report(stored.id, summary.is_complete())
            .await?;
        summary.fights_skipped.sort_by_key(|f| f.fight_id);

        Ok(summary)
    }

    /// Fetches and normalizes every configured kind for one fight, then writes
    /// the fight and its events in one transaction.
    #[instrument(skip_all, fields(fight_id = fight.id))]
    async fn ingest_fight(
        &self,
        code: &ReportCode,
        fight: &FightMeta,
        stored: &StoredReport,
        actors: &ActorDirectory,
    ) -> Result<FightOutcome, FightError> {
        let ctx = NormalizeContext {
            fight_id: fight.id,
            actors,
        };
        let mut outcome = FightOutcome::default();
        let mut events = Vec::new();

        for &kind in &self.options.kinds {
            let mut raw = self.source.fetch_events_for_fight(code, fight, kind);
            while let Some(item) = raw.next().await {
                let raw_event = item?;
                match normalize(&raw_event, kind, ctx) {
                    Ok(Normalized::Event(event)) => events.push(event),
                    Ok(Normalized::Skip(reason)) => {
                        debug!(%kind, ?reason, "Skipped event");
                        outcome.record_skip(reason.key());
                    }
                    Err(err) => {
                        debug!(%kind, error = %err, "Malformed event");
                        outcome.malformed += 1;
                    }
                }
            }
        }

        outcome.stored = self
            .store
            .persist_fight(stored, NewFight::from(fight), events)
            .await?;
        info!(
            stored = outcome.stored.total(),
            skipped = outcome.skipped,
            malformed = outcome.malformed,
            "Fight ingested"
        );
        Ok(outcome)
    }
}
