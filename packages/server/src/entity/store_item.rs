use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Something sold in the web store. Prices are in cents.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub price: i64,
    /// Total stock.
    pub max: i32,
    pub available: bool,
    pub max_per_order: i32,
    #[sea_orm(default_value = 0)]
    pub sort_index: i32,

    /// Bulk discount: ordering at least `discount_amount` units of this
    /// item takes `discount_percentage` off every unit. 0 disables it.
    pub discount_amount: i32,
    pub discount_percentage: i32,

    /// Ticket purchases grant voting rights.
    pub is_ticket: bool,
    /// Secret items are only listed and sold when `secret_key` is given.
    pub is_secret: bool,
    pub secret_key: String,

    #[sea_orm(has_many)]
    pub variants: HasMany<super::store_item_variant::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
