use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::programme::validate_time_range;
use super::shared::{double_option, validate_max_len, validate_name};
use crate::entity::calendar_event;
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCalendarEventRequest {
    pub event_id: i32,
    #[schema(example = "Sauna")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: String,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateCalendarEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub end: Option<Option<DateTime<Utc>>>,
    pub location: Option<String>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct CalendarListQuery {
    #[param(example = 1)]
    pub event_id: i32,
}

pub fn validate_create_calendar_event(req: &CreateCalendarEventRequest) -> Result<(), AppError> {
    validate_name(&req.title, "Title", 128)?;
    validate_max_len(&req.location, "location", 128)?;
    validate_time_range(req.start, req.end)
}

pub fn validate_update_calendar_event(
    req: &UpdateCalendarEventRequest,
    existing: &calendar_event::Model,
) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_name(title, "Title", 128)?;
    }
    if let Some(ref location) = req.location {
        validate_max_len(location, "location", 128)?;
    }
    let end = match req.end {
        Some(end) => end,
        None => existing.end,
    };
    validate_time_range(req.start.unwrap_or(existing.start), end)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CalendarEventResponse {
    pub id: i32,
    pub event_id: i32,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl From<calendar_event::Model> for CalendarEventResponse {
    fn from(m: calendar_event::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            title: m.title,
            description: m.description,
            start: m.start,
            end: m.end,
            location: m.location,
            created_at: m.created_at,
        }
    }
}
