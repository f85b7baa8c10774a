use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How an entry's thumbnail is produced.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailPref {
    /// A separate image file must be uploaded.
    #[sea_orm(string_value = "image")]
    Image,
    /// The entry file itself is the image (graphics compos).
    #[sea_orm(string_value = "entry_file")]
    EntryFile,
    #[sea_orm(string_value = "none")]
    None,
    /// Image may be uploaded but is not required.
    #[sea_orm(string_value = "optional")]
    Optional,
}

/// How entries are presented on the public compo page.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum EntryViewType {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "youtube")]
    Youtube,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "audio")]
    Audio,
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compo")]
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

    pub adding_end: DateTimeUtc,
    pub editing_end: DateTimeUtc,
    pub compo_start: DateTimeUtc,
    pub voting_start: DateTimeUtc,
    pub voting_end: DateTimeUtc,

    // Size limits in bytes.
    pub max_entry_size: i64,
    pub max_source_size: i64,
    pub max_image_size: i64,

    /// `|`-separated lower-case extensions, e.g. "zip|7z".
    pub entry_formats: String,
    pub source_formats: String,
    pub image_formats: String,

    pub active: bool,
    pub show_voting_results: bool,
    pub entry_view_type: EntryViewType,
    pub is_votable: bool,
    pub hide_from_archive: bool,
    pub hide_from_frontpage: bool,
    pub thumbnail_pref: ThumbnailPref,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
