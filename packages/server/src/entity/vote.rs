use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "group_entry")]
    pub group_id: i32,
    #[sea_orm(belongs_to, from = "group_id", to = "id")]
    pub group: HasOne<super::vote_group::Entity>,

    #[sea_orm(unique_key = "group_entry")]
    pub entry_id: i32,
    #[sea_orm(belongs_to, from = "entry_id", to = "id")]
    pub entry: HasOne<super::entry::Entity>,

    /// Denormalized from the group so score aggregation needs no join.
    #[sea_orm(indexed)]
    pub compo_id: i32,

    /// 1-based position on the ballot.
    pub rank: i32,
}

impl ActiveModelBehavior for ActiveModel {}
