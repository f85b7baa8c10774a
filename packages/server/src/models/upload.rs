use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{blob_ref, uploaded_file};

/// Slot name of the single file of an upload.
pub const UPLOAD_SLOT: &str = "file";

#[derive(Deserialize, utoipa::IntoParams)]
pub struct UploadListQuery {
    #[param(example = 1)]
    pub event_id: i32,
}

/// Multipart body of upload create/update. Documentation only; the
/// handler reads the stream field by field.
#[derive(utoipa::ToSchema)]
pub struct UploadForm {
    pub description: Option<String>,
    /// Required on create.
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadFileInfo {
    #[schema(example = "poster.png")]
    pub filename: String,
    pub size: i64,
    pub content_type: Option<String>,
    #[schema(example = "/api/v1/uploads/4/file")]
    pub url: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub description: String,
    pub file: Option<UploadFileInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadResponse {
    pub fn new(m: uploaded_file::Model, file: Option<&blob_ref::Model>) -> Self {
        Self {
            file: file.map(|r| UploadFileInfo {
                filename: r.filename.clone(),
                size: r.size,
                content_type: r.content_type.clone(),
                url: format!("/api/v1/uploads/{}/file", m.id),
            }),
            id: m.id,
            event_id: m.event_id,
            user_id: m.user_id,
            description: m.description,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
