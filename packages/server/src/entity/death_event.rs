use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "death_event")]
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
    /// Killing blow ability, when the provider reports one.
    pub ability_id: Option<i32>,

    pub target_player_id: Option<i32>,
    pub target_npc_id: Option<i32>,
    pub target_npc_name: Option<String>,
    pub killer_player_id: Option<i32>,
    pub killer_npc_id: Option<i32>,
    pub killer_npc_name: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
