use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::Pagination;
use crate::entity::vote_code_request::RequestStatus;
use crate::entity::{ticket_vote_code, vote_code_request};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ClaimTicketRequest {
    /// The ticket key from the receipt, or a long enough prefix of it.
    #[schema(example = "3fa94c1e0b")]
    pub ticket_key: String,
}

/// Trimmed, lower-cased key prefix, or a validation error.
pub fn normalize_ticket_key(raw: &str, min_len: usize) -> Result<String, AppError> {
    let key = raw.trim().to_ascii_lowercase();
    if key.len() < min_len {
        return Err(AppError::Validation(format!(
            "Ticket key must be at least {min_len} characters"
        )));
    }
    if !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::Validation(
            "Ticket key may only contain hexadecimal characters".into(),
        ));
    }
    Ok(key)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TicketVoteCodeResponse {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    /// ID of the claimed transaction item.
    pub ticket_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ticket_vote_code::Model> for TicketVoteCodeResponse {
    fn from(m: ticket_vote_code::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            user_id: m.user_id,
            ticket_id: m.ticket_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct VoteCodeRequestBody {
    /// Why the user should get voting rights without a ticket.
    #[schema(example = "I'm a remote visitor watching the stream")]
    pub text: String,
}

pub fn validate_request_text(body: &VoteCodeRequestBody) -> Result<(), AppError> {
    let text = body.text.trim();
    if text.is_empty() || text.chars().count() > 2000 {
        return Err(AppError::Validation("Text must be 1-2000 characters".into()));
    }
    Ok(())
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SetRequestStatusRequest {
    pub status: RequestStatus,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct VoteCodeRequestListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Only requests in this state.
    pub status: Option<RequestStatus>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VoteCodeRequestResponse {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub text: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<vote_code_request::Model> for VoteCodeRequestResponse {
    fn from(m: vote_code_request::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            user_id: m.user_id,
            text: m.text,
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VoteCodeRequestListResponse {
    pub data: Vec<VoteCodeRequestResponse>,
    pub pagination: Pagination,
}
