use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A calendar entry outside the main programme (deadlines, meetups).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "calendar_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub start: DateTimeUtc,
    pub end: Option<DateTimeUtc>,
    pub location: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
