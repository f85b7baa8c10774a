use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether a bigger or a smaller score wins.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ScoreSort {
    #[sea_orm(string_value = "highest_first")]
    HighestFirst,
    #[sea_orm(string_value = "lowest_first")]
    LowestFirst,
}

/// A non-voted competition (e.g. a game tournament) scored by staff.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition")]
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

    pub participation_end: DateTimeUtc,
    pub start: DateTimeUtc,
    pub end: Option<DateTimeUtc>,

    /// Unit shown after the score, e.g. "p" or "s".
    pub score_type: String,
    pub score_sort: ScoreSort,

    pub show_results: bool,
    pub active: bool,
    pub hide_from_archive: bool,

    #[sea_orm(has_many)]
    pub participations: HasMany<super::competition_participation::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
