use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{compo, entry};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, MaybeAuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::compo::*;
use crate::state::AppState;
use crate::utils::event::{find_event, find_visible_compo};

#[utoipa::path(
    get,
    path = "/",
    tag = "Compos",
    operation_id = "listCompos",
    summary = "List compos",
    description = "Public. Without `compo:manage` only active compos are listed. Ordered by compo start.",
    params(CompoListQuery),
    responses(
        (status = 200, description = "Compos", body = Vec<CompoResponse>),
        (status = 401, description = "Malformed token (TOKEN_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer, query))]
pub async fn list_compos(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CompoListQuery>,
) -> Result<Json<Vec<CompoResponse>>, AppError> {
    let mut select = compo::Entity::find();
    if let Some(event_id) = query.event_id {
        select = select.filter(compo::Column::EventId.eq(event_id));
    }
    if !viewer.has_permission("compo:manage") {
        select = select.filter(compo::Column::Active.eq(true));
    }

    let compos = select
        .order_by_asc(compo::Column::CompoStart)
        .order_by_asc(compo::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(compos.into_iter().map(CompoResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Compos",
    operation_id = "getCompo",
    summary = "Get a compo",
    params(("id" = i32, Path, description = "Compo ID")),
    responses(
        (status = 200, description = "Compo", body = CompoResponse),
        (status = 404, description = "Compo not found or inactive (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer), fields(id))]
pub async fn get_compo(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<CompoResponse>, AppError> {
    Ok(Json(find_visible_compo(&state.db, &viewer, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Compos",
    operation_id = "createCompo",
    summary = "Create a compo",
    description = "Requires `compo:manage`. Format lists are normalized to lower-case `|`-separated extensions.",
    request_body = CreateCompoRequest,
    responses(
        (status = 201, description = "Compo created", body = CompoResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id, name = %payload.name))]
pub async fn create_compo(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<CreateCompoRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("compo:manage")?;
    validate_create_compo(&mut payload)?;
    find_event(&state.db, payload.event_id).await?;

    let now = chrono::Utc::now();
    let model = compo::ActiveModel {
        event_id: Set(payload.event_id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        adding_end: Set(payload.adding_end),
        editing_end: Set(payload.editing_end),
        compo_start: Set(payload.compo_start),
        voting_start: Set(payload.voting_start),
        voting_end: Set(payload.voting_end),
        max_entry_size: Set(payload.max_entry_size),
        max_source_size: Set(payload.max_source_size),
        max_image_size: Set(payload.max_image_size),
        entry_formats: Set(payload.entry_formats),
        source_formats: Set(payload.source_formats),
        image_formats: Set(payload.image_formats),
        active: Set(payload.active),
        show_voting_results: Set(payload.show_voting_results),
        entry_view_type: Set(payload.entry_view_type),
        is_votable: Set(payload.is_votable),
        hide_from_archive: Set(payload.hide_from_archive),
        hide_from_frontpage: Set(payload.hide_from_frontpage),
        thumbnail_pref: Set(payload.thumbnail_pref),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(compo_id = model.id, event_id = model.event_id, "Compo created");
    Ok((StatusCode::CREATED, Json(CompoResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Compos",
    operation_id = "updateCompo",
    summary = "Update a compo",
    description = "Partial update. Requires `compo:manage`. Schedule invariants are checked against the merged values.",
    params(("id" = i32, Path, description = "Compo ID")),
    request_body = UpdateCompoRequest,
    responses(
        (status = 200, description = "Compo updated", body = CompoResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_compo(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(mut payload): AppJson<UpdateCompoRequest>,
) -> Result<Json<CompoResponse>, AppError> {
    auth_user.require_permission("compo:manage")?;
    validate_update_compo(&mut payload)?;

    let txn = state.db.begin().await?;
    let existing = compo::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Compo not found".into()))?;

    validate_schedule(&CompoSchedule {
        adding_end: payload.adding_end.unwrap_or(existing.adding_end),
        editing_end: payload.editing_end.unwrap_or(existing.editing_end),
        voting_start: payload.voting_start.unwrap_or(existing.voting_start),
        voting_end: payload.voting_end.unwrap_or(existing.voting_end),
    })?;

    let mut active: compo::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(v) = payload.description {
        active.description = Set(v);
    }
    if let Some(v) = payload.adding_end {
        active.adding_end = Set(v);
    }
    if let Some(v) = payload.editing_end {
        active.editing_end = Set(v);
    }
    if let Some(v) = payload.compo_start {
        active.compo_start = Set(v);
    }
    if let Some(v) = payload.voting_start {
        active.voting_start = Set(v);
    }
    if let Some(v) = payload.voting_end {
        active.voting_end = Set(v);
    }
    if let Some(v) = payload.max_entry_size {
        active.max_entry_size = Set(v);
    }
    if let Some(v) = payload.max_source_size {
        active.max_source_size = Set(v);
    }
    if let Some(v) = payload.max_image_size {
        active.max_image_size = Set(v);
    }
    if let Some(v) = payload.entry_formats {
        active.entry_formats = Set(v);
    }
    if let Some(v) = payload.source_formats {
        active.source_formats = Set(v);
    }
    if let Some(v) = payload.image_formats {
        active.image_formats = Set(v);
    }
    if let Some(v) = payload.active {
        active.active = Set(v);
    }
    if let Some(v) = payload.show_voting_results {
        active.show_voting_results = Set(v);
    }
    if let Some(v) = payload.entry_view_type {
        active.entry_view_type = Set(v);
    }
    if let Some(v) = payload.is_votable {
        active.is_votable = Set(v);
    }
    if let Some(v) = payload.hide_from_archive {
        active.hide_from_archive = Set(v);
    }
    if let Some(v) = payload.hide_from_frontpage {
        active.hide_from_frontpage = Set(v);
    }
    if let Some(v) = payload.thumbnail_pref {
        active.thumbnail_pref = Set(v);
    }
    active.updated_at = Set(chrono::Utc::now());

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Compos",
    operation_id = "deleteCompo",
    summary = "Delete a compo",
    description = "Requires `compo:manage`. Refused while the compo has entries.",
    params(("id" = i32, Path, description = "Compo ID")),
    responses(
        (status = 204, description = "Compo deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Compo has entries (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_compo(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("compo:manage")?;

    let txn = state.db.begin().await?;
    compo::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Compo not found".into()))?;

    let entries = entry::Entity::find()
        .filter(entry::Column::CompoId.eq(id))
        .count(&txn)
        .await?;
    if entries > 0 {
        return Err(AppError::Conflict("Compo still has entries".into()));
    }

    compo::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(compo_id = id, "Compo deleted");
    Ok(StatusCode::NO_CONTENT)
}
