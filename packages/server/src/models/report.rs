use chrono::{DateTime, Utc};
use common::{EventKind, IngestMode, RunStatus};
use serde::{Deserialize, Serialize};

use crate::entity::{fight, ingest_run, player, report};
use crate::ingest::summary::{IngestSummary, KindCounts};
use crate::ingest::IngestPhase;
use crate::store::queries::EventRow;

use super::shared::Pagination;

/// Request body for starting an ingestion.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct IngestRequest {
    /// Raw report code or full report URL.
    #[schema(example = "https://www.warcraftlogs.com/reports/AbC123xYz789QwEr#fight=3")]
    pub report: String,
}

/// Query parameters for listing reports.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ReportListQuery {
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 20).
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

/// Report summary for list views.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ReportSummary {
    #[schema(example = "AbC123xYz789QwEr")]
    pub code: String,
    #[schema(example = "Mythic progression")]
    pub title: String,
    pub owner: Option<String>,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds.
    pub end_time: i64,
    pub zone_id: Option<i32>,
    #[schema(example = "Nerub-ar Palace")]
    pub zone_name: Option<String>,
    /// True once the last ingestion stored every fight.
    pub complete: bool,
    pub ingested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<report::Model> for ReportSummary {
    fn from(m: report::Model) -> Self {
        Self {
            code: m.code,
            title: m.title,
            owner: m.owner,
            start_time: m.start_time,
            end_time: m.end_time,
            zone_id: m.zone_id,
            zone_name: m.zone_name,
            complete: m.complete,
            ingested_at: m.ingested_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReportListResponse {
    pub data: Vec<ReportSummary>,
    pub pagination: Pagination,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FightResponse {
    /// Provider fight id, used in event URLs.
    #[schema(example = 3)]
    pub fight_id: i32,
    #[schema(example = "Queen Ansurek")]
    pub name: String,
    pub kill: Option<bool>,
    pub difficulty: Option<i32>,
    pub boss_percentage: Option<f64>,
    pub average_item_level: Option<f64>,
    pub encounter_id: Option<i32>,
    /// Milliseconds from report start.
    pub start_offset: i64,
    /// Milliseconds from report start.
    pub end_offset: i64,
}

impl From<fight::Model> for FightResponse {
    fn from(m: fight::Model) -> Self {
        Self {
            fight_id: m.external_id,
            name: m.name,
            kill: m.kill,
            difficulty: m.difficulty,
            boss_percentage: m.boss_percentage,
            average_item_level: m.average_item_level,
            encounter_id: m.encounter_id,
            start_offset: m.start_offset,
            end_offset: m.end_offset,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PlayerResponse {
    /// Internal id referenced by events.
    pub id: i32,
    /// Provider actor id.
    pub actor_id: i32,
    #[schema(example = "Healbot")]
    pub name: String,
    pub server: Option<String>,
    #[schema(example = "Priest")]
    pub class: Option<String>,
    #[schema(example = "Holy")]
    pub spec: Option<String>,
}

impl From<player::Model> for PlayerResponse {
    fn from(m: player::Model) -> Self {
        Self {
            id: m.id,
            actor_id: m.actor_id,
            name: m.name,
            server: m.server,
            class: m.class,
            spec: m.spec,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReportDetailResponse {
    #[serde(flatten)]
    pub report: ReportSummary,
    pub fights: Vec<FightResponse>,
    pub players: Vec<PlayerResponse>,
    pub event_counts: KindCounts,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct IngestRunResponse {
    pub id: i32,
    pub status: RunStatus,
    pub mode: IngestMode,
    /// Present once the run succeeded.
    pub summary: Option<IngestSummary>,
    /// Present once the run failed.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<ingest_run::Model> for IngestRunResponse {
    fn from(m: ingest_run::Model) -> Self {
        Self {
            id: m.id,
            status: m.status,
            mode: m.mode,
            summary: m.summary.and_then(|v| serde_json::from_value(v).ok()),
            error: m.error,
            started_at: m.started_at,
            finished_at: m.finished_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct IngestStatusResponse {
    #[schema(example = "AbC123xYz789QwEr")]
    pub report_code: String,
    /// Live phase while an ingestion is in flight.
    pub phase: Option<IngestPhase>,
    pub last_run: Option<IngestRunResponse>,
}

/// Query parameters for listing fight events.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct FightEventsQuery {
    /// Comma-separated kinds (cast, buff, damage, heal, death). Default: all.
    #[param(example = "damage,heal")]
    pub kinds: Option<String>,
    /// Events to skip from the start of the fight.
    #[param(example = 0)]
    pub skip: Option<u64>,
    /// Maximum events returned (1-1000, default 100).
    #[param(example = 100)]
    pub limit: Option<u64>,
}

/// An actor as referenced by a stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActorView {
    Player { player_id: i32 },
    Npc { npc_id: i32, name: String },
}

impl ActorView {
    fn from_columns(
        player_id: Option<i32>,
        npc_id: Option<i32>,
        npc_name: Option<String>,
    ) -> Option<Self> {
        match (player_id, npc_id) {
            (Some(player_id), _) => Some(Self::Player { player_id }),
            (None, Some(npc_id)) => Some(Self::Npc {
                npc_id,
                name: npc_name.unwrap_or_default(),
            }),
            (None, None) => None,
        }
    }
}

/// One stored event. Kind-specific fields are omitted when they do not apply.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EventRecord {
    pub kind: EventKind,
    /// Milliseconds from report start.
    pub timestamp: i64,
    /// Fetch order within the fight and kind.
    pub sequence: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ability_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ActorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ActorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killer: Option<ActorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacks: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absorbed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overkill: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overheal: Option<i64>,
}

impl EventRecord {
    fn base(kind: EventKind, timestamp: i64, sequence: i32) -> Self {
        Self {
            kind,
            timestamp,
            sequence,
            ability_id: None,
            source: None,
            target: None,
            killer: None,
            subtype: None,
            stacks: None,
            hit_type: None,
            amount: None,
            absorbed: None,
            overkill: None,
            mitigated: None,
            overheal: None,
        }
    }
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        let kind = row.kind();
        match row {
            EventRow::Cast(m) => Self {
                ability_id: Some(m.ability_id),
                source: ActorView::from_columns(
                    m.source_player_id,
                    m.source_npc_id,
                    m.source_npc_name,
                ),
                target: ActorView::from_columns(
                    m.target_player_id,
                    m.target_npc_id,
                    m.target_npc_name,
                ),
                ..Self::base(kind, m.timestamp, m.sequence)
            },
            EventRow::Buff(m) => Self {
                ability_id: Some(m.ability_id),
                source: ActorView::from_columns(
                    m.source_player_id,
                    m.source_npc_id,
                    m.source_npc_name,
                ),
                target: ActorView::from_columns(
                    m.target_player_id,
                    m.target_npc_id,
                    m.target_npc_name,
                ),
                subtype: Some(m.subtype),
                stacks: m.stacks,
                ..Self::base(kind, m.timestamp, m.sequence)
            },
            EventRow::Damage(m) => Self {
                ability_id: Some(m.ability_id),
                source: ActorView::from_columns(
                    m.source_player_id,
                    m.source_npc_id,
                    m.source_npc_name,
                ),
                target: ActorView::from_columns(
                    m.target_player_id,
                    m.target_npc_id,
                    m.target_npc_name,
                ),
                hit_type: Some(m.hit_type),
                amount: Some(m.amount),
                absorbed: Some(m.absorbed),
                overkill: Some(m.overkill),
                mitigated: Some(m.mitigated),
                ..Self::base(kind, m.timestamp, m.sequence)
            },
            EventRow::Heal(m) => Self {
                ability_id: Some(m.ability_id),
                source: ActorView::from_columns(
                    m.source_player_id,
                    m.source_npc_id,
                    m.source_npc_name,
                ),
                target: ActorView::from_columns(
                    m.target_player_id,
                    m.target_npc_id,
                    m.target_npc_name,
                ),
                hit_type: Some(m.hit_type),
                amount: Some(m.amount),
                absorbed: Some(m.absorbed),
                overheal: Some(m.overheal),
                ..Self::base(kind, m.timestamp, m.sequence)
            },
            EventRow::Death(m) => Self {
                ability_id: m.ability_id,
                target: ActorView::from_columns(
                    m.target_player_id,
                    m.target_npc_id,
                    m.target_npc_name,
                ),
                killer: ActorView::from_columns(
                    m.killer_player_id,
                    m.killer_npc_id,
                    m.killer_npc_name,
                ),
                ..Self::base(kind, m.timestamp, m.sequence)
            },
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FightEventsResponse {
    pub fight_id: i32,
    pub kinds: Vec<EventKind>,
    pub skip: u64,
    pub limit: u64,
    /// Stored events of this fight per kind, regardless of the filter.
    pub totals: KindCounts,
    pub data: Vec<EventRecord>,
}
