//! Persistence boundary for ingested reports.

pub mod queries;
pub mod sea;

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use wcl::{ActorMeta, FightMeta, ReportMeta};

use crate::ingest::normalizer::CanonicalEvent;
use crate::ingest::summary::KindCounts;

pub use queries::ReportQueries;
pub use sea::SeaOrmReportStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] DbErr),

    /// The report row vanished between creation and a later write.
    #[error("Report {0} no longer exists")]
    ReportMissing(i32),
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub code: String,
    pub title: String,
    pub owner: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub zone_id: Option<i32>,
    pub zone_name: Option<String>,
}

impl From<&ReportMeta> for NewReport {
    fn from(meta: &ReportMeta) -> Self {
        Self {
            code: meta.code.clone(),
            title: meta.title.clone(),
            owner: meta.owner.as_ref().map(|o| o.name.clone()),
            start_time: meta.start_time,
            end_time: meta.end_time,
            zone_id: meta.zone.as_ref().map(|z| z.id),
            zone_name: meta.zone.as_ref().map(|z| z.name.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub actor_id: i32,
    pub name: String,
    pub server: Option<String>,
    pub class: Option<String>,
    pub spec: Option<String>,
}

impl NewPlayer {
    /// Player rows for every `Player` actor of the roster.
    pub fn from_roster(actors: &[ActorMeta]) -> Vec<Self> {
        actors
            .iter()
            .filter(|a| a.is_player())
            .map(|a| Self {
                actor_id: a.id,
                name: a.name.clone(),
                server: a.server.clone(),
                class: a.sub_type.clone(),
                spec: a.spec().map(str::to_string),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewFight {
    pub external_id: i32,
    pub name: String,
    pub kill: Option<bool>,
    pub difficulty: Option<i32>,
    pub boss_percentage: Option<f64>,
    pub average_item_level: Option<f64>,
    pub encounter_id: Option<i32>,
    pub start_offset: i64,
    pub end_offset: i64,
}

impl From<&FightMeta> for NewFight {
    fn from(fight: &FightMeta) -> Self {
        Self {
            external_id: fight.id,
            name: fight.name.clone(),
            kill: fight.kill,
            difficulty: fight.difficulty,
            boss_percentage: fight.boss_percentage,
            average_item_level: fight.average_item_level,
            encounter_id: fight.encounter_id,
            start_offset: fight.start_time,
            end_offset: fight.end_time,
        }
    }
}

/// A freshly created report and its player lookup.
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub id: i32,
    pub code: String,
    /// Provider actor id to internal player row id.
    pub players: HashMap<i32, i32>,
}

/// Durable storage of reports, fights, players and typed events.
///
/// Every method is one transaction. Callers serialize writes per report code.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Deletes the report with this code and everything it owns.
    /// Returns whether a report existed.
    async fn clear_report(&self, code: &str) -> Result<bool, StoreError>;

    /// Inserts the report row and its players together.
    async fn create_report(
        &self,
        report: NewReport,
        players: Vec<NewPlayer>,
    ) -> Result<StoredReport, StoreError>;

    /// Inserts one fight and all of its events. Events of each kind are stored
    /// in the order given.
    async fn persist_fight(
        &self,
        report: &StoredReport,
        fight: NewFight,
        events: Vec<CanonicalEvent>,
    ) -> Result<KindCounts, StoreError>;

    /// Marks the ingestion finished and records whether every fight made it.
    async fn finalize_report(&self, report_id: i32, complete: bool) -> Result<(), StoreError>;
}
