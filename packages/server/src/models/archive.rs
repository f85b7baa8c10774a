use serde::{Deserialize, Serialize};

use super::competition::{CompetitionResponse, ParticipationResultResponse};
use super::entry::{EntryResultResponse, validate_youtube_url};
use super::event::EventResponse;
use super::shared::{validate_max_len, validate_name};
use crate::entity::{compo, other_video, other_video_category};
use crate::error::AppError;

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct FinalizeArchiveRequest {
    /// Delete every ballot after the results have been frozen.
    #[serde(default)]
    pub remove_votes: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FinalizeArchiveResponse {
    pub event: EventResponse,
    /// Number of compos whose results were frozen.
    pub compos: usize,
    /// Ballots deleted, 0 unless `remove_votes` was set.
    pub removed_vote_groups: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ArchiveCompoSummary {
    pub id: i32,
    pub name: String,
    pub description: String,
}

impl From<compo::Model> for ArchiveCompoSummary {
    fn from(m: compo::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ArchiveCompo {
    pub compo: ArchiveCompoSummary,
    /// Entries by rank, best first.
    pub entries: Vec<EntryResultResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ArchiveCompetition {
    pub competition: CompetitionResponse,
    pub results: Vec<ParticipationResultResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VideoResponse {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub description: String,
    pub youtube_url: String,
}

impl From<other_video::Model> for VideoResponse {
    fn from(m: other_video::Model) -> Self {
        Self {
            id: m.id,
            category_id: m.category_id,
            name: m.name,
            description: m.description,
            youtube_url: m.youtube_url,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VideoCategoryResponse {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub videos: Vec<VideoResponse>,
}

impl VideoCategoryResponse {
    pub fn new(m: other_video_category::Model, videos: Vec<other_video::Model>) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            name: m.name,
            videos: videos.into_iter().map(VideoResponse::from).collect(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ArchiveEventDetail {
    pub event: EventResponse,
    pub compos: Vec<ArchiveCompo>,
    pub competitions: Vec<ArchiveCompetition>,
    pub video_categories: Vec<VideoCategoryResponse>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct VideoCategoryQuery {
    #[param(example = 1)]
    pub event_id: i32,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateVideoCategoryRequest {
    pub event_id: i32,
    #[schema(example = "Seminars")]
    pub name: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateVideoCategoryRequest {
    pub name: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateVideoRequest {
    pub category_id: i32,
    #[schema(example = "Opening ceremony")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(example = "https://www.youtube.com/watch?v=abc")]
    pub youtube_url: String,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateVideoRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub youtube_url: Option<String>,
}

pub fn validate_category_name(name: &str) -> Result<(), AppError> {
    validate_name(name, "Name", 64)
}

pub fn validate_create_video(req: &CreateVideoRequest) -> Result<(), AppError> {
    validate_name(&req.name, "Name", 64)?;
    validate_max_len(&req.description, "description", 2000)?;
    validate_youtube_url(req.youtube_url.trim())
}

pub fn validate_update_video(req: &UpdateVideoRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name, "Name", 64)?;
    }
    if let Some(ref description) = req.description {
        validate_max_len(description, "description", 2000)?;
    }
    if let Some(ref url) = req.youtube_url {
        validate_youtube_url(url.trim())?;
    }
    Ok(())
}
