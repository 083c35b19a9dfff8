use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Last committed snapshot per monitored application.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub app_name: String,
    pub last_release: String,
    pub config_vars_hash: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub snapshot: Json,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
