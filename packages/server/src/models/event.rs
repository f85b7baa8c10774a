use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, double_option, validate_name, validate_url};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateEventRequest {
    #[schema(example = "Instanssi 2026")]
    pub name: String,
    /// Short tag used in archive URLs.
    #[schema(example = "2026")]
    pub tag: Option<String>,
    #[schema(value_type = String, format = Date, example = "2026-02-27")]
    pub date: NaiveDate,
    #[serde(default)]
    pub archived: bool,
    /// Main site of the event; may be empty.
    #[serde(default)]
    #[schema(example = "https://instanssi.org/2026/")]
    pub mainurl: String,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub tag: Option<Option<String>>,
    #[schema(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
    pub archived: Option<bool>,
    pub mainurl: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Instanssi 2026")]
    pub name: String,
    pub tag: Option<String>,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub archived: bool,
    pub mainurl: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::event::Model> for EventResponse {
    fn from(m: crate::entity::event::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            tag: m.tag,
            date: m.date,
            archived: m.archived,
            mainurl: m.mainurl,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventListResponse {
    pub data: Vec<EventResponse>,
    pub pagination: Pagination,
}

fn validate_tag(tag: &str) -> Result<(), AppError> {
    let tag = tag.trim();
    if tag.is_empty()
        || tag.chars().count() > 8
        || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(AppError::Validation(
            "Tag must be 1-8 letters, digits or dashes".into(),
        ));
    }
    Ok(())
}

fn validate_mainurl(url: &str) -> Result<(), AppError> {
    if url.trim().is_empty() {
        return Ok(());
    }
    validate_url(url, "mainurl")
}

pub fn validate_create_event(req: &CreateEventRequest) -> Result<(), AppError> {
    validate_name(&req.name, "Name", 64)?;
    if let Some(ref tag) = req.tag {
        validate_tag(tag)?;
    }
    validate_mainurl(&req.mainurl)
}

pub fn validate_update_event(req: &UpdateEventRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name, "Name", 64)?;
    }
    if let Some(Some(ref tag)) = req.tag {
        validate_tag(tag)?;
    }
    if let Some(ref url) = req.mainurl {
        validate_mainurl(url)?;
    }
    Ok(())
}
