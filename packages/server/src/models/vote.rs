use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::validate_id_list;
use crate::error::AppError;

/// Ballots longer than this are refused outright.
const MAX_BALLOT_LEN: usize = 1000;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SubmitVotesRequest {
    /// Entry IDs, best first. The first entry gets rank 1.
    #[schema(example = json!([12, 7, 9]))]
    pub entry_ids: Vec<i32>,
}

pub fn validate_submit_votes(req: &SubmitVotesRequest) -> Result<(), AppError> {
    validate_id_list(&req.entry_ids, "entry_ids", MAX_BALLOT_LEN)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BallotResponse {
    pub compo_id: i32,
    /// Entry IDs in ballot order. Empty when the caller has not voted.
    pub entry_ids: Vec<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VoteGroupResponse {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub entry_ids: Vec<i32>,
    pub created_at: DateTime<Utc>,
}
