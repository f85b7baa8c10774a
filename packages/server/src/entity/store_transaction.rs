use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single order. The buyer tracks it through `token`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_transaction")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    #[sea_orm(unique)]
    pub token: Uuid,
    /// Order reference shown to the buyer and to the payment provider.
    #[sea_orm(unique)]
    pub key: String,

    pub firstname: String,
    pub lastname: String,
    pub company: String,
    pub email: String,
    pub telephone: String,
    pub mobile: String,
    pub street: String,
    pub postalcode: String,
    pub city: String,
    pub country: String,
    #[sea_orm(column_type = "Text")]
    pub information: String,
    pub payment_method_name: String,

    /// Sum of the items' purchase prices, in cents.
    pub total_price: i64,

    pub time_created: DateTimeUtc,
    pub time_pending: Option<DateTimeUtc>,
    pub time_paid: Option<DateTimeUtc>,
    pub time_cancelled: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub items: HasMany<super::transaction_item::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
