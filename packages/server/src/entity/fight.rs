use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fight")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "report_fight")]
    pub report_id: i32,
    #[sea_orm(belongs_to, from = "report_id", to = "id")]
    pub report: HasOne<super::report::Entity>,

    /// Fight id as numbered by the provider, unique within the report.
    #[sea_orm(unique_key = "report_fight")]
    pub external_id: i32,
    pub name: String,
    pub kill: Option<bool>,
    pub difficulty: Option<i32>,
    pub boss_percentage: Option<f64>,
    pub average_item_level: Option<f64>,
    pub encounter_id: Option<i32>,

    pub start_offset: i64, // millis from report start
    pub end_offset: i64,   // millis from report start

    #[sea_orm(has_many)]
    pub casts: HasMany<super::cast_event::Entity>,
    #[sea_orm(has_many)]
    pub buffs: HasMany<super::buff_event::Entity>,
    #[sea_orm(has_many)]
    pub damage: HasMany<super::damage_event::Entity>,
    #[sea_orm(has_many)]
    pub heals: HasMany<super::heal_event::Entity>,
    #[sea_orm(has_many)]
    pub deaths: HasMany<super::death_event::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
