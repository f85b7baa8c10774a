use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Archive grouping for videos that are not compo entries (seminars, streams).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "other_video_category")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    pub name: String,

    #[sea_orm(has_many)]
    pub videos: HasMany<super::other_video::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
