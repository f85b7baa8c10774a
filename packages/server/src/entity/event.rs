use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single party, e.g. "Instanssi 2026".
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    /// Short tag used in archive URLs, e.g. "2026".
    pub tag: Option<String>,
    pub date: Date,
    #[sea_orm(default_value = false)]
    pub archived: bool,
    pub mainurl: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
