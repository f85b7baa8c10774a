use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{competition, competition_participation};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, MaybeAuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::competition::*;
use crate::state::AppState;
use crate::utils::event::{find_competition, find_event};
use crate::utils::results::rank_participations;

/// Inactive competitions are hidden from everyone without `competition:manage`.
async fn find_visible_competition<C: ConnectionTrait>(
    db: &C,
    viewer: &MaybeAuthUser,
    id: i32,
) -> Result<competition::Model, AppError> {
    let competition = find_competition(db, id).await?;
    if !competition.active && !viewer.has_permission("competition:manage") {
        return Err(AppError::NotFound("Competition not found".into()));
    }
    Ok(competition)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Competitions",
    operation_id = "listCompetitions",
    summary = "List competitions",
    description = "Public. Without `competition:manage` only active competitions are listed.",
    params(CompetitionListQuery),
    responses(
        (status = 200, description = "Competitions", body = Vec<CompetitionResponse>),
    ),
)]
#[instrument(skip(state, viewer, query))]
pub async fn list_competitions(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CompetitionListQuery>,
) -> Result<Json<Vec<CompetitionResponse>>, AppError> {
    let mut select = competition::Entity::find();
    if let Some(event_id) = query.event_id {
        select = select.filter(competition::Column::EventId.eq(event_id));
    }
    if !viewer.has_permission("competition:manage") {
        select = select.filter(competition::Column::Active.eq(true));
    }
    let rows = select
        .order_by_asc(competition::Column::Start)
        .order_by_asc(competition::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(CompetitionResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Competitions",
    operation_id = "getCompetition",
    summary = "Get a competition",
    params(("id" = i32, Path, description = "Competition ID")),
    responses(
        (status = 200, description = "Competition", body = CompetitionResponse),
        (status = 404, description = "Competition not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer), fields(id))]
pub async fn get_competition(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<CompetitionResponse>, AppError> {
    Ok(Json(
        find_visible_competition(&state.db, &viewer, id)
            .await?
            .into(),
    ))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Competitions",
    operation_id = "createCompetition",
    summary = "Create a competition",
    description = "Requires `competition:manage`.",
    request_body = CreateCompetitionRequest,
    responses(
        (status = 201, description = "Competition created", body = CompetitionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id, name = %payload.name))]
pub async fn create_competition(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCompetitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("competition:manage")?;
    validate_create_competition(&payload)?;
    find_event(&state.db, payload.event_id).await?;

    let now = chrono::Utc::now();
    let model = competition::ActiveModel {
        event_id: Set(payload.event_id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        participation_end: Set(payload.participation_end),
        start: Set(payload.start),
        end: Set(payload.end),
        score_type: Set(payload.score_type),
        score_sort: Set(payload.score_sort),
        show_results: Set(payload.show_results),
        active: Set(payload.active),
        hide_from_archive: Set(payload.hide_from_archive),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(competition_id = model.id, event_id = model.event_id, "Competition created");
    Ok((StatusCode::CREATED, Json(CompetitionResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Competitions",
    operation_id = "updateCompetition",
    summary = "Update a competition",
    description = "Partial update. Requires `competition:manage`.",
    params(("id" = i32, Path, description = "Competition ID")),
    request_body = UpdateCompetitionRequest,
    responses(
        (status = 200, description = "Competition updated", body = CompetitionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Competition not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_competition(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateCompetitionRequest>,
) -> Result<Json<CompetitionResponse>, AppError> {
    auth_user.require_permission("competition:manage")?;

    let txn = state.db.begin().await?;
    let existing = competition::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Competition not found".into()))?;
    validate_update_competition(&payload, &existing)?;

    let mut active: competition::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(v) = payload.description {
        active.description = Set(v);
    }
    if let Some(v) = payload.participation_end {
        active.participation_end = Set(v);
    }
    if let Some(v) = payload.start {
        active.start = Set(v);
    }
    if let Some(v) = payload.end {
        active.end = Set(v);
    }
    if let Some(v) = payload.score_type {
        active.score_type = Set(v);
    }
    if let Some(v) = payload.score_sort {
        active.score_sort = Set(v);
    }
    if let Some(v) = payload.show_results {
        active.show_results = Set(v);
    }
    if let Some(v) = payload.active {
        active.active = Set(v);
    }
    if let Some(v) = payload.hide_from_archive {
        active.hide_from_archive = Set(v);
    }
    active.updated_at = Set(chrono::Utc::now());

    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Competitions",
    operation_id = "deleteCompetition",
    summary = "Delete a competition and its participations",
    description = "Requires `competition:manage`.",
    params(("id" = i32, Path, description = "Competition ID")),
    responses(
        (status = 204, description = "Competition deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Competition not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_competition(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("competition:manage")?;

    let txn = state.db.begin().await?;
    competition::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Competition not found".into()))?;
    competition_participation::Entity::delete_many()
        .filter(competition_participation::Column::CompetitionId.eq(id))
        .exec(&txn)
        .await?;
    competition::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(competition_id = id, "Competition deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/participation",
    tag = "Competitions",
    operation_id = "joinCompetition",
    summary = "Join a competition",
    description = "Allowed while the competition is active and before `participation_end`.",
    params(("id" = i32, Path, description = "Competition ID")),
    request_body = JoinCompetitionRequest,
    responses(
        (status = 201, description = "Joined", body = ParticipationResponse),
        (status = 400, description = "Participation closed or invalid name (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Competition not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already participating (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, user_id = auth_user.user_id))]
pub async fn join_competition(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<JoinCompetitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_join(&payload)?;

    let competition = find_competition(&state.db, id).await?;
    if !competition.active {
        return Err(AppError::NotFound("Competition not found".into()));
    }
    if !is_participation_open(&competition, chrono::Utc::now()) {
        return Err(AppError::Validation(
            "Participation for this competition has closed".into(),
        ));
    }

    let model = competition_participation::ActiveModel {
        competition_id: Set(id),
        user_id: Set(auth_user.user_id),
        participant_name: Set(payload.participant_name.trim().to_string()),
        score: Set(0.0),
        disqualified: Set(false),
        disqualified_reason: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("You are already participating".into())
        }
        _ => AppError::from(e),
    })?;

    Ok((StatusCode::CREATED, Json(ParticipationResponse::from(model))))
}

#[utoipa::path(
    delete,
    path = "/{id}/participation",
    tag = "Competitions",
    operation_id = "leaveCompetition",
    summary = "Leave a competition",
    description = "Allowed until `participation_end`.",
    params(("id" = i32, Path, description = "Competition ID")),
    responses(
        (status = 204, description = "Left"),
        (status = 400, description = "Participation closed (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not participating (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user_id = auth_user.user_id))]
pub async fn leave_competition(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let competition = find_competition(&state.db, id).await?;
    if !is_participation_open(&competition, chrono::Utc::now()) {
        return Err(AppError::Validation(
            "Participation for this competition has closed".into(),
        ));
    }

    let result = competition_participation::Entity::delete_many()
        .filter(competition_participation::Column::CompetitionId.eq(id))
        .filter(competition_participation::Column::UserId.eq(auth_user.user_id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("You are not participating".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{id}/participations",
    tag = "Competitions",
    operation_id = "listParticipations",
    summary = "All participations of a competition",
    description = "Requires `competition:manage`. In join order.",
    params(("id" = i32, Path, description = "Competition ID")),
    responses(
        (status = 200, description = "Participations", body = Vec<ParticipationResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Competition not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn list_participations(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ParticipationResponse>>, AppError> {
    auth_user.require_permission("competition:manage")?;
    find_competition(&state.db, id).await?;

    let rows = competition_participation::Entity::find()
        .filter(competition_participation::Column::CompetitionId.eq(id))
        .order_by_asc(competition_participation::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(ParticipationResponse::from).collect()))
}

#[utoipa::path(
    put,
    path = "/{id}/participations/{participation_id}",
    tag = "Competitions",
    operation_id = "setParticipationResult",
    summary = "Record a participant's score or disqualification",
    description = "Requires `competition:manage`. Omitted fields keep their value. Requalifying clears the reason.",
    params(
        ("id" = i32, Path, description = "Competition ID"),
        ("participation_id" = i32, Path, description = "Participation ID"),
    ),
    request_body = SetParticipationResultRequest,
    responses(
        (status = 200, description = "Result recorded", body = ParticipationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Participation not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, participation_id))]
pub async fn set_participation_result(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, participation_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<SetParticipationResultRequest>,
) -> Result<Json<ParticipationResponse>, AppError> {
    auth_user.require_permission("competition:manage")?;
    validate_participation_result(&payload)?;

    let existing = competition_participation::Entity::find_by_id(participation_id)
        .filter(competition_participation::Column::CompetitionId.eq(id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Participation not found".into()))?;

    let mut active: competition_participation::ActiveModel = existing.into();
    if let Some(score) = payload.score {
        active.score = Set(score);
    }
    if let Some(reason) = payload.disqualified_reason {
        active.disqualified_reason = Set(reason);
    }
    if let Some(disqualified) = payload.disqualified {
        active.disqualified = Set(disqualified);
        if !disqualified {
            active.disqualified_reason = Set(None);
        }
    }

    let updated = active.update(&state.db).await?;
    tracing::info!(participation_id, score = updated.score, disqualified = updated.disqualified, "Participation result set");
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/results",
    tag = "Competitions",
    operation_id = "getCompetitionResults",
    summary = "Ranked participations",
    description = "Public once `show_results` is set; `competition:manage` sees them any time.",
    params(("id" = i32, Path, description = "Competition ID")),
    responses(
        (status = 200, description = "Results, best first", body = Vec<ParticipationResultResponse>),
        (status = 403, description = "Results not published (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Competition not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer), fields(id))]
pub async fn competition_results(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ParticipationResultResponse>>, AppError> {
    let competition = find_visible_competition(&state.db, &viewer, id).await?;
    if !competition.show_results && !viewer.has_permission("competition:manage") {
        return Err(AppError::PermissionDenied);
    }

    let participations = competition_participation::Entity::find()
        .filter(competition_participation::Column::CompetitionId.eq(id))
        .order_by_asc(competition_participation::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(
        rank_participations(participations, competition.score_sort)
            .into_iter()
            .map(|r| ParticipationResultResponse {
                participation: r.item.into(),
                rank: r.rank,
            })
            .collect(),
    ))
}
