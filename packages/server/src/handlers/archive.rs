use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::blob_ref::OWNER_ENTRY;
use crate::entity::{
    competition, competition_participation, compo, entry, event, other_video,
    other_video_category, vote, vote_group,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, MaybeAuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::archive::*;
use crate::models::competition::ParticipationResultResponse;
use crate::models::entry::{EntryResponse, EntryResultResponse};
use crate::models::event::EventResponse;
use crate::state::AppState;
use crate::utils::event::{CompoWindow, find_event, find_event_for_update};
use crate::utils::results::{compo_results, rank_participations};
use crate::utils::upload::refs_by_owner;

async fn video_categories<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
) -> Result<Vec<VideoCategoryResponse>, AppError> {
    let categories = other_video_category::Entity::find()
        .filter(other_video_category::Column::EventId.eq(event_id))
        .order_by_asc(other_video_category::Column::Name)
        .all(db)
        .await?;
    let mut videos: HashMap<i32, Vec<other_video::Model>> = HashMap::new();
    for v in other_video::Entity::find()
        .filter(
            other_video::Column::CategoryId
                .is_in(categories.iter().map(|c| c.id).collect::<Vec<_>>()),
        )
        .order_by_asc(other_video::Column::Id)
        .all(db)
        .await?
    {
        videos.entry(v.category_id).or_default().push(v);
    }
    Ok(categories
        .into_iter()
        .map(|c| {
            let own = videos.remove(&c.id).unwrap_or_default();
            VideoCategoryResponse::new(c, own)
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/events",
    tag = "Archive",
    operation_id = "listArchivedEvents",
    summary = "List archived events",
    responses(
        (status = 200, description = "Archived events, newest first", body = Vec<EventResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_archived_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let events = event::Entity::find()
        .filter(event::Column::Archived.eq(true))
        .order_by_desc(event::Column::Date)
        .all(&state.db)
        .await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/events/{id}",
    tag = "Archive",
    operation_id = "getArchivedEvent",
    summary = "Archive page of an event",
    description = "Compos not hidden from the archive with their ranked entries, competitions with ranked \
        participants, and video categories. Public for archived events; `archive:manage` may preview any event.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Archive content", body = ArchiveEventDetail),
        (status = 404, description = "Event not found or not archived (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer), fields(id))]
pub async fn archive_event_detail(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ArchiveEventDetail>, AppError> {
    let event = find_event(&state.db, id).await?;
    if !event.archived && !viewer.has_permission("archive:manage") {
        return Err(AppError::NotFound("Event not found".into()));
    }

    let compos = compo::Entity::find()
        .filter(compo::Column::EventId.eq(id))
        .filter(compo::Column::Active.eq(true))
        .filter(compo::Column::HideFromArchive.eq(false))
        .order_by_asc(compo::Column::CompoStart)
        .order_by_asc(compo::Column::Id)
        .all(&state.db)
        .await?;

    let mut archive_compos = Vec::with_capacity(compos.len());
    for c in compos {
        let ranked = compo_results(&state.db, c.id).await?;
        let mut refs = refs_by_owner(
            &state.db,
            OWNER_ENTRY,
            ranked.iter().map(|r| r.item.id).collect(),
        )
        .await?;
        let entries = ranked
            .into_iter()
            .map(|r| {
                let own = refs.remove(&r.item.id).unwrap_or_default();
                EntryResultResponse {
                    entry: EntryResponse::new(r.item, &own),
                    score: r.score,
                    rank: r.rank,
                }
            })
            .collect();
        archive_compos.push(ArchiveCompo {
            compo: c.into(),
            entries,
        });
    }

    let competitions = competition::Entity::find()
        .filter(competition::Column::EventId.eq(id))
        .filter(competition::Column::Active.eq(true))
        .filter(competition::Column::HideFromArchive.eq(false))
        .order_by_asc(competition::Column::Start)
        .all(&state.db)
        .await?;
    let mut archive_competitions = Vec::with_capacity(competitions.len());
    for c in competitions {
        let participations = competition_participation::Entity::find()
            .filter(competition_participation::Column::CompetitionId.eq(c.id))
            .order_by_asc(competition_participation::Column::CreatedAt)
            .all(&state.db)
            .await?;
        let results = rank_participations(participations, c.score_sort)
            .into_iter()
            .map(|r| ParticipationResultResponse {
                participation: r.item.into(),
                rank: r.rank,
            })
            .collect();
        archive_competitions.push(ArchiveCompetition {
            competition: c.into(),
            results,
        });
    }

    let video_categories = video_categories(&state.db, id).await?;

    Ok(Json(ArchiveEventDetail {
        event: event.into(),
        compos: archive_compos,
        competitions: archive_competitions,
        video_categories,
    }))
}

#[utoipa::path(
    post,
    path = "/events/{id}/finalize",
    tag = "Archive",
    operation_id = "finalizeArchive",
    summary = "Freeze results and archive an event",
    description = "Requires `archive:manage`. For every compo the live score and rank of each entry are copied \
        into its archive fields, ballots are optionally deleted, and the event is marked archived, all in one \
        transaction. Refused while voting is still running in an active votable compo.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = FinalizeArchiveRequest,
    responses(
        (status = 200, description = "Event archived", body = FinalizeArchiveResponse),
        (status = 400, description = "Voting still open (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, remove_votes = payload.remove_votes))]
pub async fn finalize_archive(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<FinalizeArchiveRequest>,
) -> Result<Json<FinalizeArchiveResponse>, AppError> {
    auth_user.require_permission("archive:manage")?;

    let txn = state.db.begin().await?;
    let existing = find_event_for_update(&txn, id).await?;

    let compos = compo::Entity::find()
        .filter(compo::Column::EventId.eq(id))
        .all(&txn)
        .await?;
    let now = chrono::Utc::now();
    if let Some(open) = compos
        .iter()
        .find(|c| c.active && c.is_votable && !CompoWindow::at(c, now).has_voting_ended)
    {
        return Err(AppError::Validation(format!(
            "Voting in compo \"{}\" has not ended",
            open.name
        )));
    }

    let mut removed_vote_groups = 0;
    for c in &compos {
        // Values frozen by an earlier finalize win over the live tally, so
        // finalizing again after ballots were removed keeps the results.
        for ranked in compo_results(&txn, c.id).await? {
            let mut active: entry::ActiveModel = ranked.item.into();
            active.archive_score = Set(Some(ranked.score));
            active.archive_rank = Set(Some(ranked.rank));
            active.update(&txn).await?;
        }

        if payload.remove_votes {
            vote::Entity::delete_many()
                .filter(vote::Column::CompoId.eq(c.id))
                .exec(&txn)
                .await?;
            removed_vote_groups += vote_group::Entity::delete_many()
                .filter(vote_group::Column::CompoId.eq(c.id))
                .exec(&txn)
                .await?
                .rows_affected;
        }
    }

    let mut active: event::ActiveModel = existing.into();
    active.archived = Set(true);
    active.updated_at = Set(now);
    let archived = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        event_id = id,
        compos = compos.len(),
        removed_vote_groups,
        by = auth_user.user_id,
        "Event archived"
    );
    Ok(Json(FinalizeArchiveResponse {
        event: archived.into(),
        compos: compos.len(),
        removed_vote_groups,
    }))
}

#[utoipa::path(
    post,
    path = "/events/{id}/unarchive",
    tag = "Archive",
    operation_id = "unarchiveEvent",
    summary = "Take an event out of the archive",
    description = "Requires `archive:manage`. Frozen entry results are kept.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event unarchived", body = EventResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn unarchive_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EventResponse>, AppError> {
    auth_user.require_permission("archive:manage")?;

    let existing = find_event(&state.db, id).await?;
    let mut active: event::ActiveModel = existing.into();
    active.archived = Set(false);
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(&state.db).await?;

    tracing::info!(event_id = id, by = auth_user.user_id, "Event unarchived");
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/video-categories",
    tag = "Archive",
    operation_id = "listVideoCategories",
    summary = "Video categories of an event with their videos",
    params(VideoCategoryQuery),
    responses(
        (status = 200, description = "Categories", body = Vec<VideoCategoryResponse>),
    ),
)]
#[instrument(skip(state, query), fields(event_id = query.event_id))]
pub async fn list_video_categories(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VideoCategoryQuery>,
) -> Result<Json<Vec<VideoCategoryResponse>>, AppError> {
    Ok(Json(video_categories(&state.db, query.event_id).await?))
}

#[utoipa::path(
    post,
    path = "/video-categories",
    tag = "Archive",
    operation_id = "createVideoCategory",
    summary = "Create a video category",
    description = "Requires `archive:manage`.",
    request_body = CreateVideoCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = VideoCategoryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id))]
pub async fn create_video_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateVideoCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("archive:manage")?;
    validate_category_name(&payload.name)?;
    find_event(&state.db, payload.event_id).await?;

    let model = other_video_category::ActiveModel {
        event_id: Set(payload.event_id),
        name: Set(payload.name.trim().to_string()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(VideoCategoryResponse::new(model, Vec::new())),
    ))
}

#[utoipa::path(
    patch,
    path = "/video-categories/{id}",
    tag = "Archive",
    operation_id = "updateVideoCategory",
    summary = "Rename a video category",
    description = "Requires `archive:manage`.",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = UpdateVideoCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = VideoCategoryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_video_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateVideoCategoryRequest>,
) -> Result<Json<VideoCategoryResponse>, AppError> {
    auth_user.require_permission("archive:manage")?;
    validate_category_name(&payload.name)?;

    let existing = other_video_category::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video category not found".into()))?;
    let mut active: other_video_category::ActiveModel = existing.into();
    active.name = Set(payload.name.trim().to_string());
    let updated = active.update(&state.db).await?;

    let videos = other_video::Entity::find()
        .filter(other_video::Column::CategoryId.eq(id))
        .order_by_asc(other_video::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(VideoCategoryResponse::new(updated, videos)))
}

#[utoipa::path(
    delete,
    path = "/video-categories/{id}",
    tag = "Archive",
    operation_id = "deleteVideoCategory",
    summary = "Delete a video category and its videos",
    description = "Requires `archive:manage`.",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_video_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("archive:manage")?;

    let txn = state.db.begin().await?;
    other_video::Entity::delete_many()
        .filter(other_video::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?;
    let result = other_video_category::Entity::delete_by_id(id)
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Video category not found".into()));
    }
    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/videos",
    tag = "Archive",
    operation_id = "createVideo",
    summary = "Add a video to a category",
    description = "Requires `archive:manage`.",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video created", body = VideoResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(category_id = payload.category_id))]
pub async fn create_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateVideoRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("archive:manage")?;
    validate_create_video(&payload)?;
    other_video_category::Entity::find_by_id(payload.category_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video category not found".into()))?;

    let model = other_video::ActiveModel {
        category_id: Set(payload.category_id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        youtube_url: Set(payload.youtube_url.trim().to_string()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(VideoResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/videos/{id}",
    tag = "Archive",
    operation_id = "updateVideo",
    summary = "Update a video",
    description = "Partial update. Requires `archive:manage`.",
    params(("id" = i32, Path, description = "Video ID")),
    request_body = UpdateVideoRequest,
    responses(
        (status = 200, description = "Video updated", body = VideoResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Video not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateVideoRequest>,
) -> Result<Json<VideoResponse>, AppError> {
    auth_user.require_permission("archive:manage")?;
    validate_update_video(&payload)?;

    let existing = other_video::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".into()))?;
    let mut active: other_video::ActiveModel = existing.into();
    if let Some(ref v) = payload.name {
        active.name = Set(v.trim().to_string());
    }
    if let Some(v) = payload.description {
        active.description = Set(v);
    }
    if let Some(ref v) = payload.youtube_url {
        active.youtube_url = Set(v.trim().to_string());
    }
    Ok(Json(active.update(&state.db).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/videos/{id}",
    tag = "Archive",
    operation_id = "deleteVideo",
    summary = "Delete a video",
    description = "Requires `archive:manage`.",
    params(("id" = i32, Path, description = "Video ID")),
    responses(
        (status = 204, description = "Video deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Video not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("archive:manage")?;
    let result = other_video::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Video not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
