use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ProgrammeEventType {
    /// Just a time and a title.
    #[sea_orm(string_value = "simple")]
    Simple,
    /// Talks and shows with presenters and a description.
    #[sea_orm(string_value = "detailed")]
    Detailed,
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "programme_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    pub start: DateTimeUtc,
    pub end: Option<DateTimeUtc>,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub presenters: String,
    pub presenters_titles: String,
    pub place: String,
    pub event_type: ProgrammeEventType,
    pub active: bool,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
