use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, info, instrument};

use super::{NewFight, NewPlayer, NewReport, ReportStore, StoreError, StoredReport};
use crate::entity::{
    buff_event, cast_event, damage_event, death_event, fight, heal_event, player, report,
};
use crate::ingest::normalizer::{ActorRef, CanonicalEvent, EventBody};
use crate::ingest::summary::KindCounts;

/// Rows per INSERT statement, kept well under backend bind-parameter limits.
const INSERT_CHUNK: usize = 500;

/// [`ReportStore`] over a sea-orm connection pool.
#[derive(Clone)]
pub struct SeaOrmReportStore {
    db: DatabaseConnection,
}

impl SeaOrmReportStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// `(player_id, npc_id, npc_name)` column triple for an actor reference.
fn actor_columns(actor: Option<&ActorRef>) -> (Option<i32>, Option<i32>, Option<String>) {
    match actor {
        Some(ActorRef::Player { player_id }) => (Some(*player_id), None, None),
        Some(ActorRef::Npc { actor_id, name }) => (None, Some(*actor_id), Some(name.clone())),
        None => (None, None, None),
    }
}

async fn insert_rows<A, C>(conn: &C, rows: Vec<A>) -> Result<u64, DbErr>
where
    A: ActiveModelTrait + Send,
    C: ConnectionTrait,
{
    let total = rows.len() as u64;
    let mut rows = rows.into_iter();
    loop {
        let chunk: Vec<A> = rows.by_ref().take(INSERT_CHUNK).collect();
        if chunk.is_empty() {
            break;
        }
        <A::Entity as EntityTrait>::insert_many(chunk)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(total)
}

/// Events of one fight split into per-table rows, each numbered in arrival order.
#[derive(Default)]
struct FightRows {
    casts: Vec<cast_event::ActiveModel>,
    buffs: Vec<buff_event::ActiveModel>,
    damage: Vec<damage_event::ActiveModel>,
    heals: Vec<heal_event::ActiveModel>,
    deaths: Vec<death_event::ActiveModel>,
}

impl FightRows {
    fn build(report_id: i32, fight_id: i32, events: Vec<CanonicalEvent>) -> Self {
        let mut rows = Self::default();
        for event in events {
            let timestamp = event.timestamp;
            match event.body {
                EventBody::Cast(e) => {
                    let (sp, sn, snn) = actor_columns(Some(&e.source));
                    let (tp, tn, tnn) = actor_columns(e.target.as_ref());
                    let sequence = rows.casts.len() as i32;
                    rows.casts.push(cast_event::ActiveModel {
                        report_id: Set(report_id),
                        fight_id: Set(fight_id),
                        sequence: Set(sequence),
                        timestamp: Set(timestamp),
                        ability_id: Set(e.ability_id),
                        source_player_id: Set(sp),
                        source_npc_id: Set(sn),
                        source_npc_name: Set(snn),
                        target_player_id: Set(tp),
                        target_npc_id: Set(tn),
                        target_npc_name: Set(tnn),
                        ..Default::default()
                    });
                }
                EventBody::Buff(e) => {
                    let (sp, sn, snn) = actor_columns(e.source.as_ref());
                    let (tp, tn, tnn) = actor_columns(Some(&e.target));
                    let sequence = rows.buffs.len() as i32;
                    rows.buffs.push(buff_event::ActiveModel {
                        report_id: Set(report_id),
                        fight_id: Set(fight_id),
                        sequence: Set(sequence),
                        timestamp: Set(timestamp),
                        ability_id: Set(e.ability_id),
                        subtype: Set(e.subtype),
                        stacks: Set(e.stacks),
                        source_player_id: Set(sp),
                        source_npc_id: Set(sn),
                        source_npc_name: Set(snn),
                        target_player_id: Set(tp),
                        target_npc_id: Set(tn),
                        target_npc_name: Set(tnn),
                        ..Default::default()
                    });
                }
                EventBody::Damage(e) => {
                    let (sp, sn, snn) = actor_columns(Some(&e.source));
                    let (tp, tn, tnn) = actor_columns(e.target.as_ref());
                    let sequence = rows.damage.len() as i32;
                    rows.damage.push(damage_event::ActiveModel {
                        report_id: Set(report_id),
                        fight_id: Set(fight_id),
                        sequence: Set(sequence),
                        timestamp: Set(timestamp),
                        ability_id: Set(e.ability_id),
                        hit_type: Set(e.hit_type),
                        amount: Set(e.amount),
                        absorbed: Set(e.absorbed),
                        overkill: Set(e.overkill),
                        mitigated: Set(e.mitigated),
                        source_player_id: Set(sp),
                        source_npc_id: Set(sn),
                        source_npc_name: Set(snn),
                        target_player_id: Set(tp),
                        target_npc_id: Set(tn),
                        target_npc_name: Set(tnn),
                        ..Default::default()
                    });
                }
                EventBody::Heal(e) => {
                    let (sp, sn, snn) = actor_columns(Some(&e.source));
                    let (tp, tn, tnn) = actor_columns(e.target.as_ref());
                    let sequence = rows.heals.len() as i32;
                    rows.heals.push(heal_event::ActiveModel {
                        report_id: Set(report_id),
                        fight_id: Set(fight_id),
                        sequence: Set(sequence),
                        timestamp: Set(timestamp),
                        ability_id: Set(e.ability_id),
                        hit_type: Set(e.hit_type),
                        amount: Set(e.amount),
                        overheal: Set(e.overheal),
                        absorbed: Set(e.absorbed),
                        source_player_id: Set(sp),
                        source_npc_id: Set(sn),
                        source_npc_name: Set(snn),
                        target_player_id: Set(tp),
                        target_npc_id: Set(tn),
                        target_npc_name: Set(tnn),
                        ..Default::default()
                    });
                }
                EventBody::Death(e) => {
                    let (tp, tn, tnn) = actor_columns(Some(&e.target));
                    let (kp, kn, knn) = actor_columns(e.killer.as_ref());
                    let sequence = rows.deaths.len() as i32;
                    rows.deaths.push(death_event::ActiveModel {
                        report_id: Set(report_id),
                        fight_id: Set(fight_id),
                        sequence: Set(sequence),
                        timestamp: Set(timestamp),
                        ability_id: Set(e.ability_id),
                        target_player_id: Set(tp),
                        target_npc_id: Set(tn),
                        target_npc_name: Set(tnn),
                        killer_player_id: Set(kp),
                        killer_npc_id: Set(kn),
                        killer_npc_name: Set(knn),
                        ..Default::default()
                    });
                }
            }
        }
        rows
    }
}

#[async_trait]
impl ReportStore for SeaOrmReportStore {
    #[instrument(skip(self))]
    async fn clear_report(&self, code: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin().await?;

        let Some(existing) = report::Entity::find()
            .filter(report::Column::Code.eq(code))
            .one(&txn)
            .await?
        else {
            txn.commit().await?;
            return Ok(false);
        };
        let report_id = existing.id;

        // Children first so foreign keys never dangle mid-transaction.
        let mut events = 0;
        events += cast_event::Entity::delete_many()
            .filter(cast_event::Column::ReportId.eq(report_id))
            .exec(&txn)
            .await?
            .rows_affected;
        events += buff_event::Entity::delete_many()
            .filter(buff_event::Column::ReportId.eq(report_id))
            .exec(&txn)
            .await?
            .rows_affected;
        events += damage_event::Entity::delete_many()
            .filter(damage_event::Column::ReportId.eq(report_id))
            .exec(&txn)
            .await?
            .rows_affected;
        events += heal_event::Entity::delete_many()
            .filter(heal_event::Column::ReportId.eq(report_id))
            .exec(&txn)
            .await?
            .rows_affected;
        events += death_event::Entity::delete_many()
            .filter(death_event::Column::ReportId.eq(report_id))
            .exec(&txn)
            .await?
            .rows_affected;
        let fights = fight::Entity::delete_many()
            .filter(fight::Column::ReportId.eq(report_id))
            .exec(&txn)
            .await?
            .rows_affected;
        player::Entity::delete_many()
            .filter(player::Column::ReportId.eq(report_id))
            .exec(&txn)
            .await?;
        report::Entity::delete_by_id(report_id).exec(&txn).await?;

        txn.commit().await?;
        info!(report_id, fights, events, "Cleared previous report data");
        Ok(true)
    }

    #[instrument(skip_all, fields(report_code = %new.code, players = players.len()))]
    async fn create_report(
        &self,
        new: NewReport,
        players: Vec<NewPlayer>,
    ) -> Result<StoredReport, StoreError> {
        let txn = self.db.begin().await?;

        let created = report::ActiveModel {
            code: Set(new.code.clone()),
            title: Set(new.title),
            owner: Set(new.owner),
            start_time: Set(new.start_time),
            end_time: Set(new.end_time),
            zone_id: Set(new.zone_id),
            zone_name: Set(new.zone_name),
            complete: Set(false),
            ingested_at: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let rows: Vec<_> = players
            .into_iter()
            .map(|p| player::ActiveModel {
                report_id: Set(created.id),
                actor_id: Set(p.actor_id),
                name: Set(p.name),
                server: Set(p.server),
                class: Set(p.class),
                spec: Set(p.spec),
                ..Default::default()
            })
            .collect();
        insert_rows(&txn, rows).await?;

        let lookup = player::Entity::find()
            .filter(player::Column::ReportId.eq(created.id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.actor_id, p.id))
            .collect::<HashMap<_, _>>();

        txn.commit().await?;
        debug!(report_id = created.id, "Created report");
        Ok(StoredReport {
            id: created.id,
            code: new.code,
            players: lookup,
        })
    }

    #[instrument(skip_all, fields(report_id = stored.id, fight_id = new.external_id, events = events.len()))]
    async fn persist_fight(
        &self,
        stored: &StoredReport,
        new: NewFight,
        events: Vec<CanonicalEvent>,
    ) -> Result<KindCounts, StoreError> {
        let txn = self.db.begin().await?;

        // A concurrent delete would otherwise leave orphaned fights.
        if report::Entity::find_by_id(stored.id).one(&txn).await?.is_none() {
            return Err(StoreError::ReportMissing(stored.id));
        }

        let fight_row = fight::ActiveModel {
            report_id: Set(stored.id),
            external_id: Set(new.external_id),
            name: Set(new.name),
            kill: Set(new.kill),
            difficulty: Set(new.difficulty),
            boss_percentage: Set(new.boss_percentage),
            average_item_level: Set(new.average_item_level),
            encounter_id: Set(new.encounter_id),
            start_offset: Set(new.start_offset),
            end_offset: Set(new.end_offset),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let rows = FightRows::build(stored.id, fight_row.id, events);
        let counts = KindCounts {
            cast: insert_rows(&txn, rows.casts).await?,
            buff: insert_rows(&txn, rows.buffs).await?,
            damage: insert_rows(&txn, rows.damage).await?,
            heal: insert_rows(&txn, rows.heals).await?,
            death: insert_rows(&txn, rows.deaths).await?,
        };

        txn.commit().await?;
        debug!(total = counts.total(), "Persisted fight");
        Ok(counts)
    }

    async fn finalize_report(&self, report_id: i32, complete: bool) -> Result<(), StoreError> {
        let result = report::Entity::update_many()
            .col_expr(report::Column::Complete, Expr::value(complete))
            .col_expr(report::Column::IngestedAt, Expr::value(Utc::now()))
            .filter(report::Column::Id.eq(report_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::ReportMissing(report_id));
        }
        Ok(())
    }
}
