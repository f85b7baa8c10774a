use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// E.g. a T-shirt size.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_item_variant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub item_id: i32,
    #[sea_orm(belongs_to, from = "item_id", to = "id")]
    pub item: HasOne<super::store_item::Entity>,

    pub name: String,
}

impl ActiveModelBehavior for ActiveModel {}
