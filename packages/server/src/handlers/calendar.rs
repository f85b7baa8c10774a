use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{calendar_event, programme_event};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::calendar::*;
use crate::state::AppState;
use crate::utils::event::find_event;
use crate::utils::ical::{CalendarItem, render_calendar};

#[utoipa::path(
    get,
    path = "/",
    tag = "Calendar",
    operation_id = "listCalendarEvents",
    summary = "An event's calendar entries",
    params(CalendarListQuery),
    responses(
        (status = 200, description = "Calendar entries ordered by start", body = Vec<CalendarEventResponse>),
    ),
)]
#[instrument(skip(state, query), fields(event_id = query.event_id))]
pub async fn list_calendar_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CalendarListQuery>,
) -> Result<Json<Vec<CalendarEventResponse>>, AppError> {
    let rows = calendar_event::Entity::find()
        .filter(calendar_event::Column::EventId.eq(query.event_id))
        .order_by_asc(calendar_event::Column::Start)
        .order_by_asc(calendar_event::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(CalendarEventResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Calendar",
    operation_id = "createCalendarEvent",
    summary = "Add a calendar entry",
    description = "Requires `programme:manage`.",
    request_body = CreateCalendarEventRequest,
    responses(
        (status = 201, description = "Calendar entry created", body = CalendarEventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id))]
pub async fn create_calendar_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCalendarEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("programme:manage")?;
    validate_create_calendar_event(&payload)?;
    find_event(&state.db, payload.event_id).await?;

    let model = calendar_event::ActiveModel {
        event_id: Set(payload.event_id),
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        start: Set(payload.start),
        end: Set(payload.end),
        location: Set(payload.location),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(CalendarEventResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Calendar",
    operation_id = "updateCalendarEvent",
    summary = "Update a calendar entry",
    description = "Partial update. Requires `programme:manage`.",
    params(("id" = i32, Path, description = "Calendar entry ID")),
    request_body = UpdateCalendarEventRequest,
    responses(
        (status = 200, description = "Calendar entry updated", body = CalendarEventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Calendar entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_calendar_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateCalendarEventRequest>,
) -> Result<Json<CalendarEventResponse>, AppError> {
    auth_user.require_permission("programme:manage")?;

    let txn = state.db.begin().await?;
    let existing = calendar_event::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Calendar entry not found".into()))?;
    validate_update_calendar_event(&payload, &existing)?;

    let mut active: calendar_event::ActiveModel = existing.into();
    if let Some(ref v) = payload.title {
        active.title = Set(v.trim().to_string());
    }
    if let Some(v) = payload.description {
        active.description = Set(v);
    }
    if let Some(v) = payload.start {
        active.start = Set(v);
    }
    if let Some(v) = payload.end {
        active.end = Set(v);
    }
    if let Some(v) = payload.location {
        active.location = Set(v);
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Calendar",
    operation_id = "deleteCalendarEvent",
    summary = "Delete a calendar entry",
    description = "Requires `programme:manage`.",
    params(("id" = i32, Path, description = "Calendar entry ID")),
    responses(
        (status = 204, description = "Calendar entry deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Calendar entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_calendar_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("programme:manage")?;
    let result = calendar_event::Entity::delete_by_id(id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Calendar entry not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{id}/calendar.ics",
    tag = "Calendar",
    operation_id = "eventCalendarIcs",
    summary = "iCalendar feed of an event",
    description = "Active programme events and calendar entries as RFC 5545 `text/calendar`.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Calendar", content_type = "text/calendar"),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn event_calendar_ics(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let event = find_event(&state.db, id).await?;

    let programme = programme_event::Entity::find()
        .filter(programme_event::Column::EventId.eq(id))
        .filter(programme_event::Column::Active.eq(true))
        .order_by_asc(programme_event::Column::Start)
        .all(&state.db)
        .await?;
    let calendar = calendar_event::Entity::find()
        .filter(calendar_event::Column::EventId.eq(id))
        .order_by_asc(calendar_event::Column::Start)
        .all(&state.db)
        .await?;

    let mut items: Vec<CalendarItem<'_>> = programme
        .iter()
        .map(|p| CalendarItem {
            uid: format!("programme-{}@instanssi", p.id),
            summary: &p.title,
            description: &p.description,
            location: &p.place,
            start: p.start,
            end: p.end,
        })
        .chain(calendar.iter().map(|c| CalendarItem {
            uid: format!("calendar-{}@instanssi", c.id),
            summary: &c.title,
            description: &c.description,
            location: &c.location,
            start: c.start,
            end: c.end,
        }))
        .collect();
    items.sort_by_key(|i| i.start);

    let body = render_calendar(&event.name, &items, chrono::Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"event-{id}.ics\""),
            ),
        ],
        body,
    ))
}
