use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_max_len, validate_name};
use crate::entity::programme_event::{self, ProgrammeEventType};
use crate::error::AppError;

fn default_event_type() -> ProgrammeEventType {
    ProgrammeEventType::Simple
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateProgrammeEventRequest {
    pub event_id: i32,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    #[schema(example = "Opening ceremony")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Comma-separated names.
    #[serde(default)]
    pub presenters: String,
    #[serde(default)]
    pub presenters_titles: String,
    #[serde(default)]
    #[schema(example = "Main stage")]
    pub place: String,
    #[serde(default = "default_event_type")]
    pub event_type: ProgrammeEventType,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateProgrammeEventRequest {
    pub start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub end: Option<Option<DateTime<Utc>>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub presenters: Option<String>,
    pub presenters_titles: Option<String>,
    pub place: Option<String>,
    pub event_type: Option<ProgrammeEventType>,
    pub active: Option<bool>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ProgrammeListQuery {
    #[param(example = 1)]
    pub event_id: i32,
}

fn validate_texts(
    presenters: Option<&str>,
    presenters_titles: Option<&str>,
    place: Option<&str>,
) -> Result<(), AppError> {
    if let Some(v) = presenters {
        validate_max_len(v, "presenters", 256)?;
    }
    if let Some(v) = presenters_titles {
        validate_max_len(v, "presenters_titles", 256)?;
    }
    if let Some(v) = place {
        validate_max_len(v, "place", 64)?;
    }
    Ok(())
}

pub fn validate_time_range(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), AppError> {
    if end.is_some_and(|end| end < start) {
        return Err(AppError::Validation("end must not be before start".into()));
    }
    Ok(())
}

pub fn validate_create_programme(req: &CreateProgrammeEventRequest) -> Result<(), AppError> {
    validate_name(&req.title, "Title", 128)?;
    validate_texts(
        Some(&req.presenters),
        Some(&req.presenters_titles),
        Some(&req.place),
    )?;
    validate_time_range(req.start, req.end)
}

pub fn validate_update_programme(
    req: &UpdateProgrammeEventRequest,
    existing: &programme_event::Model,
) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_name(title, "Title", 128)?;
    }
    validate_texts(
        req.presenters.as_deref(),
        req.presenters_titles.as_deref(),
        req.place.as_deref(),
    )?;
    let end = match req.end {
        Some(end) => end,
        None => existing.end,
    };
    validate_time_range(req.start.unwrap_or(existing.start), end)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProgrammeEventResponse {
    pub id: i32,
    pub event_id: i32,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub title: String,
    pub description: String,
    pub presenters: String,
    pub presenters_titles: String,
    pub place: String,
    pub event_type: ProgrammeEventType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<programme_event::Model> for ProgrammeEventResponse {
    fn from(m: programme_event::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            start: m.start,
            end: m.end,
            title: m.title,
            description: m.description,
            presenters: m.presenters,
            presenters_titles: m.presenters_titles,
            place: m.place,
            event_type: m.event_type,
            active: m.active,
            created_at: m.created_at,
        }
    }
}
