use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "heal_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub report_id: i32,
    pub fight_id: i32,
    #[sea_orm(belongs_to, from = "fight_id", to = "id")]
    pub fight: HasOne<super::fight::Entity>,

    pub sequence: i32,
    pub timestamp: i64,
    pub ability_id: i32,
    pub hit_type: i32,
    pub amount: i64,
    pub overheal: i64,
    pub absorbed: i64,

    pub source_player_id: Option<i32>,
    pub source_npc_id: Option<i32>,
    pub source_npc_name: Option<String>,
    pub target_player_id: Option<i32>,
    pub target_npc_id: Option<i32>,
    pub target_npc_name: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
