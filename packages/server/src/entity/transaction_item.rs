use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One purchased unit. Tickets are identified by `key`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub key: String,

    #[sea_orm(indexed)]
    pub transaction_id: i32,
    #[sea_orm(belongs_to, from = "transaction_id", to = "id")]
    pub transaction: HasOne<super::store_transaction::Entity>,

    #[sea_orm(indexed)]
    pub item_id: i32,
    #[sea_orm(belongs_to, from = "item_id", to = "id")]
    pub item: HasOne<super::store_item::Entity>,

    pub variant_id: Option<i32>,
    #[sea_orm(belongs_to, from = "variant_id", to = "id")]
    pub variant: HasOne<super::store_item_variant::Entity>,

    pub purchase_price: i64,
    pub original_price: i64,

    pub time_delivered: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
