use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// External report code.
    #[sea_orm(unique)]
    pub code: String,
    pub title: String,
    pub owner: Option<String>,

    pub start_time: i64, // epoch millis
    pub end_time: i64,   // epoch millis

    pub zone_id: Option<i32>,
    pub zone_name: Option<String>,

    /// True once every fight of the last ingestion was persisted.
    #[sea_orm(default_value = false)]
    pub complete: bool,
    pub ingested_at: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub fights: HasMany<super::fight::Entity>,
    #[sea_orm(has_many)]
    pub players: HasMany<super::player::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
