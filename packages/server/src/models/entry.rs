use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_max_len, validate_name};
use crate::entity::compo::{self, ThumbnailPref};
use crate::entity::{blob_ref, entry};
use crate::error::AppError;

/// File slots of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntrySlot {
    /// The work itself.
    Entryfile,
    /// Optional sources.
    Sourcefile,
    /// Screenshot or cover image.
    Imagefile,
}

impl EntrySlot {
    pub const ALL: [EntrySlot; 3] = [Self::Entryfile, Self::Sourcefile, Self::Imagefile];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entryfile => "entryfile",
            Self::Sourcefile => "sourcefile",
            Self::Imagefile => "imagefile",
        }
    }

    pub fn from_field(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    pub fn formats(self, compo: &compo::Model) -> &str {
        match self {
            Self::Entryfile => &compo.entry_formats,
            Self::Sourcefile => &compo.source_formats,
            Self::Imagefile => &compo.image_formats,
        }
    }

    pub fn max_size(self, compo: &compo::Model) -> u64 {
        let size = match self {
            Self::Entryfile => compo.max_entry_size,
            Self::Sourcefile => compo.max_source_size,
            Self::Imagefile => compo.max_image_size,
        };
        u64::try_from(size).unwrap_or(0)
    }
}

/// Text part of a create/update multipart form. Every field is optional
/// at this stage; `check_entry_fields` decides what is required.
#[derive(Debug, Default)]
pub struct EntryFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub platform: Option<String>,
    pub youtube_url: Option<String>,
}

impl EntryFields {
    /// Returns false for unknown field names.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "description" => &mut self.description,
            "creator" => &mut self.creator,
            "platform" => &mut self.platform,
            "youtube_url" => &mut self.youtube_url,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

/// Multipart body of `createEntry` / `updateEntry`. Documentation only;
/// the handler reads the stream field by field.
#[derive(utoipa::ToSchema)]
pub struct EntryForm {
    #[schema(example = "Pulse")]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(example = "Group of Three")]
    pub creator: Option<String>,
    #[schema(example = "Windows")]
    pub platform: Option<String>,
    pub youtube_url: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub entryfile: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub sourcefile: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub imagefile: Option<Vec<u8>>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EntryFileInfo {
    #[schema(example = "pulse.zip")]
    pub filename: String,
    pub size: i64,
    pub content_type: Option<String>,
    /// Download path relative to the API root.
    #[schema(example = "/api/v1/entries/7/files/entryfile")]
    pub url: String,
}

impl EntryFileInfo {
    fn from_ref(entry_id: i32, r: &blob_ref::Model) -> Self {
        Self {
            filename: r.filename.clone(),
            size: r.size,
            content_type: r.content_type.clone(),
            url: format!("/api/v1/entries/{entry_id}/files/{}", r.slot),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EntryResponse {
    #[schema(example = 7)]
    pub id: i32,
    pub compo_id: i32,
    pub user_id: i32,
    pub name: String,
    pub description: String,
    pub creator: String,
    pub platform: Option<String>,
    pub youtube_url: Option<String>,
    pub disqualified: bool,
    pub disqualified_reason: Option<String>,
    pub archive_score: Option<f64>,
    pub archive_rank: Option<i32>,
    pub entryfile: Option<EntryFileInfo>,
    pub sourcefile: Option<EntryFileInfo>,
    pub imagefile: Option<EntryFileInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryResponse {
    pub fn new(m: entry::Model, refs: &[blob_ref::Model]) -> Self {
        let file = |slot: EntrySlot| {
            refs.iter()
                .find(|r| r.slot == slot.as_str())
                .map(|r| EntryFileInfo::from_ref(m.id, r))
        };
        Self {
            entryfile: file(EntrySlot::Entryfile),
            sourcefile: file(EntrySlot::Sourcefile),
            imagefile: file(EntrySlot::Imagefile),
            id: m.id,
            compo_id: m.compo_id,
            user_id: m.user_id,
            name: m.name,
            description: m.description,
            creator: m.creator,
            platform: m.platform,
            youtube_url: m.youtube_url,
            disqualified: m.disqualified,
            disqualified_reason: m.disqualified_reason,
            archive_score: m.archive_score,
            archive_rank: m.archive_rank,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }

    /// Builds responses for a batch using refs grouped by entry id.
    pub fn many(
        entries: Vec<entry::Model>,
        refs: &HashMap<i32, Vec<blob_ref::Model>>,
    ) -> Vec<Self> {
        entries
            .into_iter()
            .map(|e| {
                let own = refs.get(&e.id).map(Vec::as_slice).unwrap_or(&[]);
                Self::new(e, own)
            })
            .collect()
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EntryResultResponse {
    #[serde(flatten)]
    pub entry: EntryResponse,
    /// Sum of `1/rank` over all ballots, or the archived score.
    #[schema(example = 12.5)]
    pub score: f64,
    #[schema(example = 1)]
    pub rank: i32,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct DisqualifyEntryRequest {
    #[schema(example = "Entry was not made for this party")]
    pub reason: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SetArchiveFieldsRequest {
    /// `null` clears the override.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub archive_score: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub archive_rank: Option<Option<i32>>,
}

pub fn validate_archive_fields(req: &SetArchiveFieldsRequest) -> Result<(), AppError> {
    if let Some(Some(rank)) = req.archive_rank
        && rank < 1
    {
        return Err(AppError::Validation("archive_rank must be >= 1".into()));
    }
    if let Some(Some(score)) = req.archive_score
        && !score.is_finite()
    {
        return Err(AppError::Validation("archive_score must be finite".into()));
    }
    Ok(())
}

fn normalize_optional(value: Option<&str>) -> Option<Option<String>> {
    value.map(|v| {
        let v = v.trim().to_string();
        (!v.is_empty()).then_some(v)
    })
}

pub fn validate_youtube_url(url: &str) -> Result<(), AppError> {
    let allowed = [
        "https://www.youtube.com/",
        "https://youtube.com/",
        "https://youtu.be/",
        "https://m.youtube.com/",
    ];
    if !allowed.iter().any(|p| url.starts_with(p)) || url.len() > 255 {
        return Err(AppError::Validation(
            "youtube_url must be a https YouTube link".into(),
        ));
    }
    Ok(())
}

/// Checked, trimmed text values ready to be written. Optional columns use
/// the PATCH convention: `Some(None)` clears them.
#[derive(Debug, Default)]
pub struct EntryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub platform: Option<Option<String>>,
    pub youtube_url: Option<Option<String>>,
}

impl EntryChanges {
    /// Whether nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.creator.is_none()
            && self.platform.is_none()
            && self.youtube_url.is_none()
    }
}

pub fn check_entry_fields(fields: &EntryFields, creating: bool) -> Result<EntryChanges, AppError> {
    if creating && (fields.name.is_none() || fields.creator.is_none()) {
        return Err(AppError::Validation(
            "name and creator are required".into(),
        ));
    }
    let changes = EntryChanges {
        name: fields.name.as_deref().map(|v| v.trim().to_string()),
        description: fields.description.clone(),
        creator: fields.creator.as_deref().map(|v| v.trim().to_string()),
        platform: normalize_optional(fields.platform.as_deref()),
        youtube_url: normalize_optional(fields.youtube_url.as_deref()),
    };
    if let Some(ref name) = changes.name {
        validate_name(name, "Name", 64)?;
    }
    if let Some(ref creator) = changes.creator {
        validate_name(creator, "Creator", 64)?;
    }
    if let Some(ref description) = changes.description {
        validate_max_len(description, "Description", 10_000)?;
    }
    if let Some(Some(ref platform)) = changes.platform {
        validate_max_len(platform, "Platform", 128)?;
    }
    if let Some(Some(ref url)) = changes.youtube_url {
        validate_youtube_url(url)?;
    }
    Ok(changes)
}

/// Which files an entry ends up with after a create or update.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotPresence {
    pub entryfile: bool,
    pub imagefile: bool,
}

/// Apply the compo's thumbnail policy. `uploaded_image` is true when the
/// request itself carries an image.
pub fn check_thumbnail_policy(
    pref: ThumbnailPref,
    uploaded_image: bool,
    after: SlotPresence,
) -> Result<(), AppError> {
    if !after.entryfile {
        return Err(AppError::Validation("entryfile is required".into()));
    }
    match pref {
        ThumbnailPref::Image if !after.imagefile => Err(AppError::Validation(
            "This compo requires an imagefile".into(),
        )),
        ThumbnailPref::EntryFile if uploaded_image => Err(AppError::Validation(
            "This compo uses the entry file as its image; do not upload an imagefile".into(),
        )),
        ThumbnailPref::None if uploaded_image => Err(AppError::Validation(
            "This compo does not accept an imagefile".into(),
        )),
        _ => Ok(()),
    }
}
