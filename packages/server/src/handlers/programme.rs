use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::programme_event;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, MaybeAuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::programme::*;
use crate::state::AppState;
use crate::utils::event::find_event;

#[utoipa::path(
    get,
    path = "/",
    tag = "Programme",
    operation_id = "listProgramme",
    summary = "An event's programme",
    description = "Public: active programme events ordered by start. `programme:manage` also sees inactive ones.",
    params(ProgrammeListQuery),
    responses(
        (status = 200, description = "Programme", body = Vec<ProgrammeEventResponse>),
    ),
)]
#[instrument(skip(state, viewer, query), fields(event_id = query.event_id))]
pub async fn list_programme(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProgrammeListQuery>,
) -> Result<Json<Vec<ProgrammeEventResponse>>, AppError> {
    let mut select = programme_event::Entity::find()
        .filter(programme_event::Column::EventId.eq(query.event_id));
    if !viewer.has_permission("programme:manage") {
        select = select.filter(programme_event::Column::Active.eq(true));
    }
    let rows = select
        .order_by_asc(programme_event::Column::Start)
        .order_by_asc(programme_event::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(ProgrammeEventResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Programme",
    operation_id = "createProgrammeEvent",
    summary = "Add a programme event",
    description = "Requires `programme:manage`.",
    request_body = CreateProgrammeEventRequest,
    responses(
        (status = 201, description = "Programme event created", body = ProgrammeEventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id))]
pub async fn create_programme_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateProgrammeEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("programme:manage")?;
    validate_create_programme(&payload)?;
    find_event(&state.db, payload.event_id).await?;

    let model = programme_event::ActiveModel {
        event_id: Set(payload.event_id),
        start: Set(payload.start),
        end: Set(payload.end),
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        presenters: Set(payload.presenters),
        presenters_titles: Set(payload.presenters_titles),
        place: Set(payload.place),
        event_type: Set(payload.event_type),
        active: Set(payload.active),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(ProgrammeEventResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Programme",
    operation_id = "updateProgrammeEvent",
    summary = "Update a programme event",
    description = "Partial update. Requires `programme:manage`.",
    params(("id" = i32, Path, description = "Programme event ID")),
    request_body = UpdateProgrammeEventRequest,
    responses(
        (status = 200, description = "Programme event updated", body = ProgrammeEventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Programme event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_programme_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateProgrammeEventRequest>,
) -> Result<Json<ProgrammeEventResponse>, AppError> {
    auth_user.require_permission("programme:manage")?;

    let txn = state.db.begin().await?;
    let existing = programme_event::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Programme event not found".into()))?;
    validate_update_programme(&payload, &existing)?;

    let mut active: programme_event::ActiveModel = existing.into();
    if let Some(v) = payload.start {
        active.start = Set(v);
    }
    if let Some(v) = payload.end {
        active.end = Set(v);
    }
    if let Some(ref v) = payload.title {
        active.title = Set(v.trim().to_string());
    }
    if let Some(v) = payload.description {
        active.description = Set(v);
    }
    if let Some(v) = payload.presenters {
        active.presenters = Set(v);
    }
    if let Some(v) = payload.presenters_titles {
        active.presenters_titles = Set(v);
    }
    if let Some(v) = payload.place {
        active.place = Set(v);
    }
    if let Some(v) = payload.event_type {
        active.event_type = Set(v);
    }
    if let Some(v) = payload.active {
        active.active = Set(v);
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Programme",
    operation_id = "deleteProgrammeEvent",
    summary = "Delete a programme event",
    description = "Requires `programme:manage`.",
    params(("id" = i32, Path, description = "Programme event ID")),
    responses(
        (status = 204, description = "Programme event deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Programme event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_programme_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("programme:manage")?;
    let result = programme_event::Entity::delete_by_id(id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Programme event not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
