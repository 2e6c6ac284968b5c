use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "player")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "report_actor")]
    pub report_id: i32,
    #[sea_orm(belongs_to, from = "report_id", to = "id")]
    pub report: HasOne<super::report::Entity>,

    /// Actor id as numbered by the provider, unique within the report.
    #[sea_orm(unique_key = "report_actor")]
    pub actor_id: i32,
    pub name: String,
    pub server: Option<String>,
    pub class: Option<String>,
    pub spec: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
