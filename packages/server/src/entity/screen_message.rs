use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Text shown on the party screen between `show_start` and `show_end`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "screen_message")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    #[sea_orm(column_type = "Text")]
    pub text: String,
    pub show_start: DateTimeUtc,
    pub show_end: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
