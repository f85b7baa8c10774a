use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::validate_name;
use crate::entity::compo::{EntryViewType, ThumbnailPref};
use crate::error::AppError;
use crate::utils::event::CompoWindow;
use crate::utils::filename::normalize_formats;

const MB: i64 = 1024 * 1024;

fn default_entry_size() -> i64 {
    128 * MB
}

fn default_image_size() -> i64 {
    6 * MB
}

fn default_archive_formats() -> String {
    "zip|7z|tar.gz|tar.bz2".into()
}

fn default_image_formats() -> String {
    "png|jpg|jpeg".into()
}

fn default_true() -> bool {
    true
}

fn default_view_type() -> EntryViewType {
    EntryViewType::None
}

fn default_thumbnail_pref() -> ThumbnailPref {
    ThumbnailPref::Optional
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCompoRequest {
    pub event_id: i32,
    #[schema(example = "Demo")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub adding_end: DateTime<Utc>,
    pub editing_end: DateTime<Utc>,
    pub compo_start: DateTime<Utc>,
    pub voting_start: DateTime<Utc>,
    pub voting_end: DateTime<Utc>,
    /// Bytes. Defaults to 128 MiB.
    #[serde(default = "default_entry_size")]
    pub max_entry_size: i64,
    #[serde(default = "default_entry_size")]
    pub max_source_size: i64,
    /// Bytes. Defaults to 6 MiB.
    #[serde(default = "default_image_size")]
    pub max_image_size: i64,
    /// `|`-separated extensions.
    #[serde(default = "default_archive_formats")]
    #[schema(example = "zip|7z")]
    pub entry_formats: String,
    #[serde(default = "default_archive_formats")]
    pub source_formats: String,
    #[serde(default = "default_image_formats")]
    pub image_formats: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub show_voting_results: bool,
    #[serde(default = "default_view_type")]
    pub entry_view_type: EntryViewType,
    #[serde(default = "default_true")]
    pub is_votable: bool,
    #[serde(default)]
    pub hide_from_archive: bool,
    #[serde(default)]
    pub hide_from_frontpage: bool,
    #[serde(default = "default_thumbnail_pref")]
    pub thumbnail_pref: ThumbnailPref,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateCompoRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub adding_end: Option<DateTime<Utc>>,
    pub editing_end: Option<DateTime<Utc>>,
    pub compo_start: Option<DateTime<Utc>>,
    pub voting_start: Option<DateTime<Utc>>,
    pub voting_end: Option<DateTime<Utc>>,
    pub max_entry_size: Option<i64>,
    pub max_source_size: Option<i64>,
    pub max_image_size: Option<i64>,
    pub entry_formats: Option<String>,
    pub source_formats: Option<String>,
    pub image_formats: Option<String>,
    pub active: Option<bool>,
    pub show_voting_results: Option<bool>,
    pub entry_view_type: Option<EntryViewType>,
    pub is_votable: Option<bool>,
    pub hide_from_archive: Option<bool>,
    pub hide_from_frontpage: Option<bool>,
    pub thumbnail_pref: Option<ThumbnailPref>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct CompoListQuery {
    /// Only compos of this event.
    #[param(example = 1)]
    pub event_id: Option<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CompoResponse {
    #[schema(example = 3)]
    pub id: i32,
    pub event_id: i32,
    #[schema(example = "Demo")]
    pub name: String,
    pub description: String,
    pub adding_end: DateTime<Utc>,
    pub editing_end: DateTime<Utc>,
    pub compo_start: DateTime<Utc>,
    pub voting_start: DateTime<Utc>,
    pub voting_end: DateTime<Utc>,
    pub max_entry_size: i64,
    pub max_source_size: i64,
    pub max_image_size: i64,
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
    /// New entries are accepted.
    pub is_adding_open: bool,
    /// Owners may still edit their entries.
    pub is_editing_open: bool,
    pub is_voting_open: bool,
    pub has_voting_started: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::compo::Model> for CompoResponse {
    fn from(m: crate::entity::compo::Model) -> Self {
        let window = CompoWindow::now(&m);
        Self {
            id: m.id,
            event_id: m.event_id,
            name: m.name,
            description: m.description,
            adding_end: m.adding_end,
            editing_end: m.editing_end,
            compo_start: m.compo_start,
            voting_start: m.voting_start,
            voting_end: m.voting_end,
            max_entry_size: m.max_entry_size,
            max_source_size: m.max_source_size,
            max_image_size: m.max_image_size,
            entry_formats: m.entry_formats,
            source_formats: m.source_formats,
            image_formats: m.image_formats,
            active: m.active,
            show_voting_results: m.show_voting_results,
            entry_view_type: m.entry_view_type,
            is_votable: m.is_votable,
            hide_from_archive: m.hide_from_archive,
            hide_from_frontpage: m.hide_from_frontpage,
            thumbnail_pref: m.thumbnail_pref,
            is_adding_open: window.is_adding_open,
            is_editing_open: window.is_editing_open,
            is_voting_open: window.is_voting_open,
            has_voting_started: window.has_voting_started,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Schedule of a compo, used for cross-field checks after a partial
/// update has been merged with the stored values.
pub struct CompoSchedule {
    pub adding_end: DateTime<Utc>,
    pub editing_end: DateTime<Utc>,
    pub voting_start: DateTime<Utc>,
    pub voting_end: DateTime<Utc>,
}

pub fn validate_schedule(s: &CompoSchedule) -> Result<(), AppError> {
    if s.editing_end < s.adding_end {
        return Err(AppError::Validation(
            "editing_end must not be before adding_end".into(),
        ));
    }
    if s.voting_end <= s.voting_start {
        return Err(AppError::Validation(
            "voting_end must be after voting_start".into(),
        ));
    }
    Ok(())
}

fn validate_size(size: i64, field: &str) -> Result<(), AppError> {
    if size <= 0 {
        return Err(AppError::Validation(format!("{field} must be positive")));
    }
    Ok(())
}

/// Normalizes a format list in place.
pub fn normalize_format_field(formats: &mut String, field: &str) -> Result<(), AppError> {
    *formats =
        normalize_formats(formats).map_err(|e| AppError::Validation(format!("{field}: {e}")))?;
    Ok(())
}

pub fn validate_create_compo(req: &mut CreateCompoRequest) -> Result<(), AppError> {
    validate_name(&req.name, "Name", 32)?;
    validate_size(req.max_entry_size, "max_entry_size")?;
    validate_size(req.max_source_size, "max_source_size")?;
    validate_size(req.max_image_size, "max_image_size")?;
    normalize_format_field(&mut req.entry_formats, "entry_formats")?;
    normalize_format_field(&mut req.source_formats, "source_formats")?;
    normalize_format_field(&mut req.image_formats, "image_formats")?;
    validate_schedule(&CompoSchedule {
        adding_end: req.adding_end,
        editing_end: req.editing_end,
        voting_start: req.voting_start,
        voting_end: req.voting_end,
    })
}

pub fn validate_update_compo(req: &mut UpdateCompoRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name, "Name", 32)?;
    }
    for (size, field) in [
        (req.max_entry_size, "max_entry_size"),
        (req.max_source_size, "max_source_size"),
        (req.max_image_size, "max_image_size"),
    ] {
        if let Some(size) = size {
            validate_size(size, field)?;
        }
    }
    if let Some(ref mut f) = req.entry_formats {
        normalize_format_field(f, "entry_formats")?;
    }
    if let Some(ref mut f) = req.source_formats {
        normalize_format_field(f, "source_formats")?;
    }
    if let Some(ref mut f) = req.image_formats {
        normalize_format_field(f, "image_formats")?;
    }
    Ok(())
}
