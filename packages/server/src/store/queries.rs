//! Read-side queries backing the HTTP API.

use common::EventKind;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::entity::{
    buff_event, cast_event, damage_event, death_event, fight, heal_event, ingest_run, player,
    report,
};
use crate::ingest::summary::KindCounts;

/// One stored event row of any kind.
#[derive(Debug, Clone)]
pub enum EventRow {
    Cast(cast_event::Model),
    Buff(buff_event::Model),
    Damage(damage_event::Model),
    Heal(heal_event::Model),
    Death(death_event::Model),
}

impl EventRow {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Cast(_) => EventKind::Cast,
            Self::Buff(_) => EventKind::Buff,
            Self::Damage(_) => EventKind::Damage,
            Self::Heal(_) => EventKind::Heal,
            Self::Death(_) => EventKind::Death,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Cast(m) => m.timestamp,
            Self::Buff(m) => m.timestamp,
            Self::Damage(m) => m.timestamp,
            Self::Heal(m) => m.timestamp,
            Self::Death(m) => m.timestamp,
        }
    }

    pub fn sequence(&self) -> i32 {
        match self {
            Self::Cast(m) => m.sequence,
            Self::Buff(m) => m.sequence,
            Self::Damage(m) => m.sequence,
            Self::Heal(m) => m.sequence,
            Self::Death(m) => m.sequence,
        }
    }

    /// Merge order across kinds: time, then kind, then arrival order.
    fn sort_key(&self) -> (i64, usize, i32) {
        let kind_rank = EventKind::ALL
            .iter()
            .position(|k| *k == self.kind())
            .unwrap_or(usize::MAX);
        (self.timestamp(), kind_rank, self.sequence())
    }
}

pub struct ReportQueries<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ReportQueries<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// A page of reports, newest first, and the total count.
    pub async fn list_reports(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<report::Model>, u64), DbErr> {
        let select = report::Entity::find();
        let total = select.clone().paginate(self.conn, per_page).num_items().await?;
        let data = select
            .order_by(report::Column::CreatedAt, Order::Desc)
            .order_by(report::Column::Id, Order::Desc)
            .offset(Some((page - 1) * per_page))
            .limit(Some(per_page))
            .all(self.conn)
            .await?;
        Ok((data, total))
    }

    pub async fn report_by_code(&self, code: &str) -> Result<Option<report::Model>, DbErr> {
        report::Entity::find()
            .filter(report::Column::Code.eq(code))
            .one(self.conn)
            .await
    }

    pub async fn fights(&self, report_id: i32) -> Result<Vec<fight::Model>, DbErr> {
        fight::Entity::find()
            .filter(fight::Column::ReportId.eq(report_id))
            .order_by_asc(fight::Column::ExternalId)
            .all(self.conn)
            .await
    }

    pub async fn players(&self, report_id: i32) -> Result<Vec<player::Model>, DbErr> {
        player::Entity::find()
            .filter(player::Column::ReportId.eq(report_id))
            .order_by_asc(player::Column::ActorId)
            .all(self.conn)
            .await
    }

    pub async fn fight_by_external_id(
        &self,
        report_id: i32,
        external_id: i32,
    ) -> Result<Option<fight::Model>, DbErr> {
        fight::Entity::find()
            .filter(fight::Column::ReportId.eq(report_id))
            .filter(fight::Column::ExternalId.eq(external_id))
            .one(self.conn)
            .await
    }

    pub async fn event_counts_for_report(&self, report_id: i32) -> Result<KindCounts, DbErr> {
        Ok(KindCounts {
            cast: cast_event::Entity::find()
                .filter(cast_event::Column::ReportId.eq(report_id))
                .count(self.conn)
                .await?,
            buff: buff_event::Entity::find()
                .filter(buff_event::Column::ReportId.eq(report_id))
                .count(self.conn)
                .await?,
            damage: damage_event::Entity::find()
                .filter(damage_event::Column::ReportId.eq(report_id))
                .count(self.conn)
                .await?,
            heal: heal_event::Entity::find()
                .filter(heal_event::Column::ReportId.eq(report_id))
                .count(self.conn)
                .await?,
            death: death_event::Entity::find()
                .filter(death_event::Column::ReportId.eq(report_id))
                .count(self.conn)
                .await?,
        })
    }

    pub async fn event_counts_for_fight(&self, fight_id: i32) -> Result<KindCounts, DbErr> {
        Ok(KindCounts {
            cast: cast_event::Entity::find()
                .filter(cast_event::Column::FightId.eq(fight_id))
                .count(self.conn)
                .await?,
            buff: buff_event::Entity::find()
                .filter(buff_event::Column::FightId.eq(fight_id))
                .count(self.conn)
                .await?,
            damage: damage_event::Entity::find()
                .filter(damage_event::Column::FightId.eq(fight_id))
                .count(self.conn)
                .await?,
            heal: heal_event::Entity::find()
                .filter(heal_event::Column::FightId.eq(fight_id))
                .count(self.conn)
                .await?,
            death: death_event::Entity::find()
                .filter(death_event::Column::FightId.eq(fight_id))
                .count(self.conn)
                .await?,
        })
    }

    /// Events of one fight across the requested kinds, merged in time order.
    ///
    /// Each table contributes at most `skip + limit` rows, which is enough to
    /// produce the requested window of the merged sequence.
    pub async fn fight_events(
        &self,
        fight_id: i32,
        kinds: &[EventKind],
        skip: u64,
        limit: u64,
    ) -> Result<Vec<EventRow>, DbErr> {
        let window = skip.saturating_add(limit);
        let mut rows = Vec::new();

        for kind in kinds {
            match kind {
                EventKind::Cast => rows.extend(
                    cast_event::Entity::find()
                        .filter(cast_event::Column::FightId.eq(fight_id))
                        .order_by_asc(cast_event::Column::Timestamp)
                        .order_by_asc(cast_event::Column::Sequence)
                        .limit(Some(window))
                        .all(self.conn)
                        .await?
                        .into_iter()
                        .map(EventRow::Cast),
                ),
                EventKind::Buff => rows.extend(
                    buff_event::Entity::find()
                        .filter(buff_event::Column::FightId.eq(fight_id))
                        .order_by_asc(buff_event::Column::Timestamp)
                        .order_by_asc(buff_event::Column::Sequence)
                        .limit(Some(window))
                        .all(self.conn)
                        .await?
                        .into_iter()
                        .map(EventRow::Buff),
                ),
                EventKind::Damage => rows.extend(
                    damage_event::Entity::find()
                        .filter(damage_event::Column::FightId.eq(fight_id))
                        .order_by_asc(damage_event::Column::Timestamp)
                        .order_by_asc(damage_event::Column::Sequence)
                        .limit(Some(window))
                        .all(self.conn)
                        .await?
                        .into_iter()
                        .map(EventRow::Damage),
                ),
                EventKind::Heal => rows.extend(
                    heal_event::Entity::find()
                        .filter(heal_event::Column::FightId.eq(fight_id))
                        .order_by_asc(heal_event::Column::Timestamp)
                        .order_by_asc(heal_event::Column::Sequence)
                        .limit(Some(window))
                        .all(self.conn)
                        .await?
                        .into_iter()
                        .map(EventRow::Heal),
                ),
                EventKind::Death => rows.extend(
                    death_event::Entity::find()
                        .filter(death_event::Column::FightId.eq(fight_id))
                        .order_by_asc(death_event::Column::Timestamp)
                        .order_by_asc(death_event::Column::Sequence)
                        .limit(Some(window))
                        .all(self.conn)
                        .await?
                        .into_iter()
                        .map(EventRow::Death),
                ),
            }
        }

        rows.sort_by_key(EventRow::sort_key);
        Ok(rows
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    /// Most recent ingestion run for a report code.
    pub async fn latest_run(&self, code: &str) -> Result<Option<ingest_run::Model>, DbErr> {
        ingest_run::Entity::find()
            .filter(ingest_run::Column::ReportCode.eq(code))
            .order_by_desc(ingest_run::Column::StartedAt)
            .order_by_desc(ingest_run::Column::Id)
            .one(self.conn)
            .await
    }
}
