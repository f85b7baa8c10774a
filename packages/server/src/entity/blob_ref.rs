use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const OWNER_ENTRY: &str = "entry";
pub const OWNER_UPLOAD: &str = "upload";

/// Named slot pointing at a stored file, e.g. the `entryfile` of entry 12.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blob_ref")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique_key = "owner_slot")]
    pub owner_type: String,
    #[sea_orm(unique_key = "owner_slot")]
    pub owner_id: i32,
    #[sea_orm(unique_key = "owner_slot")]
    pub slot: String,

    #[sea_orm(indexed)]
    pub content_hash: String,
    #[sea_orm(belongs_to, from = "content_hash", to = "content_hash")]
    pub blob_object: HasOne<super::blob_object::Entity>,

    /// Original upload filename.
    pub filename: String,
    pub content_type: Option<String>,
    /// Denormalized to avoid JOINs for list queries.
    pub size: i64,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
