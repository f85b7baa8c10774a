use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{
    calendar_event, competition, compo, event, other_video, other_video_category,
    programme_event, screen_message, sponsor, store_item, uploaded_file, vote_code_request,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::event::*;
use crate::models::shared::{PageQuery, Pagination};
use crate::state::AppState;
use crate::utils::event::{find_event, find_event_for_update};

#[utoipa::path(
    get,
    path = "/",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List events",
    description = "Public. Newest event date first.",
    params(PageQuery),
    responses(
        (status = 200, description = "Events", body = EventListResponse),
        (status = 400, description = "Bad query (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<EventListResponse>, AppError> {
    let (page, per_page) = query.resolve();
    let select = event::Entity::find();

    let total = select.clone().count(&state.db).await?;
    let data = select
        .order_by_desc(event::Column::Date)
        .order_by_desc(event::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(EventResponse::from)
        .collect();

    Ok(Json(EventListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Events",
    operation_id = "getEvent",
    summary = "Get an event",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EventResponse>, AppError> {
    Ok(Json(find_event(&state.db, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Events",
    operation_id = "createEvent",
    summary = "Create an event",
    description = "Requires `event:manage`.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("event:manage")?;
    validate_create_event(&payload)?;

    let now = chrono::Utc::now();
    let model = event::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        tag: Set(payload.tag.map(|t| t.trim().to_string())),
        date: Set(payload.date),
        archived: Set(payload.archived),
        mainurl: Set(payload.mainurl.trim().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(event_id = model.id, "Event created");
    Ok((StatusCode::CREATED, Json(EventResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Events",
    operation_id = "updateEvent",
    summary = "Update an event",
    description = "Partial update. Requires `event:manage`. `tag: null` clears the tag.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    auth_user.require_permission("event:manage")?;
    validate_update_event(&payload)?;

    let txn = state.db.begin().await?;
    let existing = find_event_for_update(&txn, id).await?;
    let mut active: event::ActiveModel = existing.into();

    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(tag) = payload.tag {
        active.tag = Set(tag.map(|t| t.trim().to_string()));
    }
    if let Some(date) = payload.date {
        active.date = Set(date);
    }
    if let Some(archived) = payload.archived {
        active.archived = Set(archived);
    }
    if let Some(ref mainurl) = payload.mainurl {
        active.mainurl = Set(mainurl.trim().to_string());
    }
    active.updated_at = Set(chrono::Utc::now());

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Events",
    operation_id = "deleteEvent",
    summary = "Delete an event",
    description = "Requires `event:manage`. Refused while the event still has compos, competitions, store items or uploads. Programme, calendar, screen and video data is removed with it.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Event still has content (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("event:manage")?;

    let txn = state.db.begin().await?;
    find_event_for_update(&txn, id).await?;

    let compos = compo::Entity::find()
        .filter(compo::Column::EventId.eq(id))
        .count(&txn)
        .await?;
    let competitions = competition::Entity::find()
        .filter(competition::Column::EventId.eq(id))
        .count(&txn)
        .await?;
    let items = store_item::Entity::find()
        .filter(store_item::Column::EventId.eq(id))
        .count(&txn)
        .await?;
    let uploads = uploaded_file::Entity::find()
        .filter(uploaded_file::Column::EventId.eq(id))
        .count(&txn)
        .await?;
    if compos + competitions + items + uploads > 0 {
        return Err(AppError::Conflict(
            "Event still has compos, competitions, store items or uploads".into(),
        ));
    }

    // Schedule, screen and archive extras go with the event.
    let categories: Vec<i32> = other_video_category::Entity::find()
        .select_only()
        .column(other_video_category::Column::Id)
        .filter(other_video_category::Column::EventId.eq(id))
        .into_tuple()
        .all(&txn)
        .await?;
    if !categories.is_empty() {
        other_video::Entity::delete_many()
            .filter(other_video::Column::CategoryId.is_in(categories))
            .exec(&txn)
            .await?;
    }
    other_video_category::Entity::delete_many()
        .filter(other_video_category::Column::EventId.eq(id))
        .exec(&txn)
        .await?;
    programme_event::Entity::delete_many()
        .filter(programme_event::Column::EventId.eq(id))
        .exec(&txn)
        .await?;
    calendar_event::Entity::delete_many()
        .filter(calendar_event::Column::EventId.eq(id))
        .exec(&txn)
        .await?;
    screen_message::Entity::delete_many()
        .filter(screen_message::Column::EventId.eq(id))
        .exec(&txn)
        .await?;
    sponsor::Entity::delete_many()
        .filter(sponsor::Column::EventId.eq(id))
        .exec(&txn)
        .await?;
    vote_code_request::Entity::delete_many()
        .filter(vote_code_request::Column::EventId.eq(id))
        .exec(&txn)
        .await?;

    event::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(event_id = id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}
