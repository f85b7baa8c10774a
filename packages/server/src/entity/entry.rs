use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A work submitted to a compo. Files live in `blob_ref` rows owned by
/// the entry (`entryfile`, `sourcefile`, `imagefile`).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entry")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub compo_id: i32,
    #[sea_orm(belongs_to, from = "compo_id", to = "id")]
    pub compo: HasOne<super::compo::Entity>,

    #[sea_orm(indexed)]
    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub creator: String,
    pub platform: Option<String>,
    pub youtube_url: Option<String>,

    #[sea_orm(default_value = false)]
    pub disqualified: bool,
    pub disqualified_reason: Option<String>,

    /// Frozen results once the event is archived. Override computed values.
    pub archive_score: Option<f64>,
    pub archive_rank: Option<i32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
