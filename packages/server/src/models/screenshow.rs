use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{validate_name, validate_url};
use crate::entity::{screen_message, sponsor};
use crate::error::AppError;

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ScreenshowQuery {
    #[param(example = 1)]
    pub event_id: i32,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateMessageRequest {
    pub event_id: i32,
    #[schema(example = "Demo compo starts in 15 minutes!")]
    pub text: String,
    pub show_start: DateTime<Utc>,
    pub show_end: DateTime<Utc>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateMessageRequest {
    pub text: Option<String>,
    pub show_start: Option<DateTime<Utc>>,
    pub show_end: Option<DateTime<Utc>>,
}

pub fn validate_show_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::Validation(
            "show_end must be after show_start".into(),
        ));
    }
    Ok(())
}

pub fn validate_create_message(req: &CreateMessageRequest) -> Result<(), AppError> {
    validate_name(&req.text, "Text", 2000)?;
    validate_show_window(req.show_start, req.show_end)
}

pub fn validate_update_message(
    req: &UpdateMessageRequest,
    existing: &screen_message::Model,
) -> Result<(), AppError> {
    if let Some(ref text) = req.text {
        validate_name(text, "Text", 2000)?;
    }
    validate_show_window(
        req.show_start.unwrap_or(existing.show_start),
        req.show_end.unwrap_or(existing.show_end),
    )
}

/// Shown while `show_start <= now < show_end`.
pub fn is_showing(m: &screen_message::Model, now: DateTime<Utc>) -> bool {
    m.show_start <= now && now < m.show_end
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub id: i32,
    pub event_id: i32,
    pub text: String,
    pub show_start: DateTime<Utc>,
    pub show_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<screen_message::Model> for MessageResponse {
    fn from(m: screen_message::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            text: m.text,
            show_start: m.show_start,
            show_end: m.show_end,
            created_at: m.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSponsorRequest {
    pub event_id: i32,
    #[schema(example = "Example Oy")]
    pub name: String,
    #[schema(example = "https://example.com")]
    pub url: String,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateSponsorRequest {
    pub name: Option<String>,
    pub url: Option<String>,
}

pub fn validate_create_sponsor(req: &CreateSponsorRequest) -> Result<(), AppError> {
    validate_name(&req.name, "Name", 64)?;
    validate_url(&req.url, "url")
}

pub fn validate_update_sponsor(req: &UpdateSponsorRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name, "Name", 64)?;
    }
    if let Some(ref url) = req.url {
        validate_url(url, "url")?;
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SponsorResponse {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<sponsor::Model> for SponsorResponse {
    fn from(m: sponsor::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            name: m.name,
            url: m.url,
            created_at: m.created_at,
        }
    }
}
