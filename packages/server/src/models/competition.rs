use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_max_len, validate_name};
use crate::entity::competition::{self, ScoreSort};
use crate::entity::competition_participation;
use crate::error::AppError;

fn default_score_type() -> String {
    "p".into()
}

fn default_score_sort() -> ScoreSort {
    ScoreSort::HighestFirst
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCompetitionRequest {
    pub event_id: i32,
    #[schema(example = "Quake 3 tournament")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Joining closes at this time.
    pub participation_end: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// Unit shown after scores.
    #[serde(default = "default_score_type")]
    #[schema(example = "p")]
    pub score_type: String,
    #[serde(default = "default_score_sort")]
    pub score_sort: ScoreSort,
    #[serde(default)]
    pub show_results: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub hide_from_archive: bool,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateCompetitionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub participation_end: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    /// `null` clears the end time.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub end: Option<Option<DateTime<Utc>>>,
    pub score_type: Option<String>,
    pub score_sort: Option<ScoreSort>,
    pub show_results: Option<bool>,
    pub active: Option<bool>,
    pub hide_from_archive: Option<bool>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct CompetitionListQuery {
    #[param(example = 1)]
    pub event_id: Option<i32>,
}

fn validate_times(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), AppError> {
    if end.is_some_and(|end| end < start) {
        return Err(AppError::Validation("end must not be before start".into()));
    }
    Ok(())
}

pub fn validate_create_competition(req: &CreateCompetitionRequest) -> Result<(), AppError> {
    validate_name(&req.name, "Name", 32)?;
    validate_max_len(&req.score_type, "score_type", 8)?;
    validate_times(req.start, req.end)
}

/// Field checks, then the time range check against the merged values.
pub fn validate_update_competition(
    req: &UpdateCompetitionRequest,
    existing: &competition::Model,
) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name, "Name", 32)?;
    }
    if let Some(ref score_type) = req.score_type {
        validate_max_len(score_type, "score_type", 8)?;
    }
    let start = req.start.unwrap_or(existing.start);
    let end = match req.end {
        Some(end) => end,
        None => existing.end,
    };
    validate_times(start, end)
}

pub fn is_participation_open(competition: &competition::Model, now: DateTime<Utc>) -> bool {
    competition.active && now < competition.participation_end
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CompetitionResponse {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub description: String,
    pub participation_end: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub score_type: String,
    pub score_sort: ScoreSort,
    pub show_results: bool,
    pub active: bool,
    pub hide_from_archive: bool,
    pub is_participation_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<competition::Model> for CompetitionResponse {
    fn from(m: competition::Model) -> Self {
        let is_participation_open = is_participation_open(&m, Utc::now());
        Self {
            id: m.id,
            event_id: m.event_id,
            name: m.name,
            description: m.description,
            participation_end: m.participation_end,
            start: m.start,
            end: m.end,
            score_type: m.score_type,
            score_sort: m.score_sort,
            show_results: m.show_results,
            active: m.active,
            hide_from_archive: m.hide_from_archive,
            is_participation_open,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct JoinCompetitionRequest {
    /// Nick or team name shown in results.
    #[schema(example = "dr.sarah")]
    pub participant_name: String,
}

pub fn validate_join(req: &JoinCompetitionRequest) -> Result<(), AppError> {
    validate_name(&req.participant_name, "participant_name", 32)
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SetParticipationResultRequest {
    pub score: Option<f64>,
    pub disqualified: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub disqualified_reason: Option<Option<String>>,
}

pub fn validate_participation_result(req: &SetParticipationResultRequest) -> Result<(), AppError> {
    if req.score.is_some_and(|s| !s.is_finite()) {
        return Err(AppError::Validation("score must be a finite number".into()));
    }
    if let Some(Some(ref reason)) = req.disqualified_reason {
        validate_max_len(reason, "disqualified_reason", 255)?;
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ParticipationResponse {
    pub id: i32,
    pub competition_id: i32,
    pub user_id: i32,
    pub participant_name: String,
    pub score: f64,
    pub disqualified: bool,
    pub disqualified_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<competition_participation::Model> for ParticipationResponse {
    fn from(m: competition_participation::Model) -> Self {
        Self {
            id: m.id,
            competition_id: m.competition_id,
            user_id: m.user_id,
            participant_name: m.participant_name,
            score: m.score,
            disqualified: m.disqualified,
            disqualified_reason: m.disqualified_reason,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ParticipationResultResponse {
    #[serde(flatten)]
    pub participation: ParticipationResponse,
    /// Dense rank; disqualified participants share the last rank.
    pub rank: i32,
}
