use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{screen_message, sponsor};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::screenshow::*;
use crate::state::AppState;
use crate::utils::event::find_event;

#[utoipa::path(
    get,
    path = "/messages",
    tag = "Screenshow",
    operation_id = "listMessages",
    summary = "All screen messages of an event",
    description = "Requires `screenshow:manage`.",
    params(ScreenshowQuery),
    responses(
        (status = 200, description = "Messages ordered by show start", body = Vec<MessageResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(event_id = query.event_id))]
pub async fn list_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ScreenshowQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    auth_user.require_permission("screenshow:manage")?;
    let rows = screen_message::Entity::find()
        .filter(screen_message::Column::EventId.eq(query.event_id))
        .order_by_asc(screen_message::Column::ShowStart)
        .order_by_asc(screen_message::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(MessageResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/messages/active",
    tag = "Screenshow",
    operation_id = "activeMessages",
    summary = "Messages to show right now",
    description = "Public. Messages with `show_start <= now < show_end`.",
    params(ScreenshowQuery),
    responses(
        (status = 200, description = "Messages", body = Vec<MessageResponse>),
    ),
)]
#[instrument(skip(state, query), fields(event_id = query.event_id))]
pub async fn active_messages(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ScreenshowQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let now = chrono::Utc::now();
    let rows = screen_message::Entity::find()
        .filter(screen_message::Column::EventId.eq(query.event_id))
        .filter(screen_message::Column::ShowEnd.gt(now))
        .order_by_asc(screen_message::Column::ShowStart)
        .order_by_asc(screen_message::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(
        rows.into_iter()
            .filter(|m| is_showing(m, now))
            .map(MessageResponse::from)
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/messages",
    tag = "Screenshow",
    operation_id = "createMessage",
    summary = "Add a screen message",
    description = "Requires `screenshow:manage`.",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id))]
pub async fn create_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("screenshow:manage")?;
    validate_create_message(&payload)?;
    find_event(&state.db, payload.event_id).await?;

    let model = screen_message::ActiveModel {
        event_id: Set(payload.event_id),
        text: Set(payload.text.trim().to_string()),
        show_start: Set(payload.show_start),
        show_end: Set(payload.show_end),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/messages/{id}",
    tag = "Screenshow",
    operation_id = "updateMessage",
    summary = "Update a screen message",
    description = "Partial update. Requires `screenshow:manage`.",
    params(("id" = i32, Path, description = "Message ID")),
    request_body = UpdateMessageRequest,
    responses(
        (status = 200, description = "Message updated", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Message not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    auth_user.require_permission("screenshow:manage")?;

    let txn = state.db.begin().await?;
    let existing = screen_message::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?;
    validate_update_message(&payload, &existing)?;

    let mut active: screen_message::ActiveModel = existing.into();
    if let Some(ref v) = payload.text {
        active.text = Set(v.trim().to_string());
    }
    if let Some(v) = payload.show_start {
        active.show_start = Set(v);
    }
    if let Some(v) = payload.show_end {
        active.show_end = Set(v);
    }
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/messages/{id}",
    tag = "Screenshow",
    operation_id = "deleteMessage",
    summary = "Delete a screen message",
    description = "Requires `screenshow:manage`.",
    params(("id" = i32, Path, description = "Message ID")),
    responses(
        (status = 204, description = "Message deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Message not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("screenshow:manage")?;
    let result = screen_message::Entity::delete_by_id(id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Message not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/sponsors",
    tag = "Screenshow",
    operation_id = "listSponsors",
    summary = "An event's sponsors",
    params(ScreenshowQuery),
    responses(
        (status = 200, description = "Sponsors ordered by name", body = Vec<SponsorResponse>),
    ),
)]
#[instrument(skip(state, query), fields(event_id = query.event_id))]
pub async fn list_sponsors(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ScreenshowQuery>,
) -> Result<Json<Vec<SponsorResponse>>, AppError> {
    let rows = sponsor::Entity::find()
        .filter(sponsor::Column::EventId.eq(query.event_id))
        .order_by_asc(sponsor::Column::Name)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(SponsorResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/sponsors",
    tag = "Screenshow",
    operation_id = "createSponsor",
    summary = "Add a sponsor",
    description = "Requires `screenshow:manage`.",
    request_body = CreateSponsorRequest,
    responses(
        (status = 201, description = "Sponsor created", body = SponsorResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id))]
pub async fn create_sponsor(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSponsorRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("screenshow:manage")?;
    validate_create_sponsor(&payload)?;
    find_event(&state.db, payload.event_id).await?;

    let model = sponsor::ActiveModel {
        event_id: Set(payload.event_id),
        name: Set(payload.name.trim().to_string()),
        url: Set(payload.url.trim().to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(SponsorResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/sponsors/{id}",
    tag = "Screenshow",
    operation_id = "updateSponsor",
    summary = "Update a sponsor",
    description = "Partial update. Requires `screenshow:manage`.",
    params(("id" = i32, Path, description = "Sponsor ID")),
    request_body = UpdateSponsorRequest,
    responses(
        (status = 200, description = "Sponsor updated", body = SponsorResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Sponsor not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_sponsor(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateSponsorRequest>,
) -> Result<Json<SponsorResponse>, AppError> {
    auth_user.require_permission("screenshow:manage")?;
    validate_update_sponsor(&payload)?;

    let existing = sponsor::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sponsor not found".into()))?;
    let mut active: sponsor::ActiveModel = existing.into();
    if let Some(ref v) = payload.name {
        active.name = Set(v.trim().to_string());
    }
    if let Some(ref v) = payload.url {
        active.url = Set(v.trim().to_string());
    }
    Ok(Json(active.update(&state.db).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/sponsors/{id}",
    tag = "Screenshow",
    operation_id = "deleteSponsor",
    summary = "Delete a sponsor",
    description = "Requires `screenshow:manage`.",
    params(("id" = i32, Path, description = "Sponsor ID")),
    responses(
        (status = 204, description = "Sponsor deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Sponsor not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_sponsor(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("screenshow:manage")?;
    let result = sponsor::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Sponsor not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
