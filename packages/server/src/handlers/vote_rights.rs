use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::{LockType, Query as SeaQuery};
use sea_orm::*;
use tracing::instrument;

use crate::entity::vote_code_request::RequestStatus;
use crate::entity::{
    store_item, store_transaction, ticket_vote_code, transaction_item, vote_code_request,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::shared::{Pagination, resolve_page};
use crate::models::vote_rights::*;
use crate::state::AppState;
use crate::utils::event::find_event;

#[utoipa::path(
    post,
    path = "/{id}/vote-codes",
    tag = "Voting Rights",
    operation_id = "claimTicketVoteCode",
    summary = "Claim voting rights with a ticket",
    description = "The key (or a prefix of at least `store.ticket_key_min_length` characters) must match exactly one \
        paid ticket of the event. Each ticket can be claimed once and each user holds at most one code per event.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = ClaimTicketRequest,
    responses(
        (status = 201, description = "Voting rights granted", body = TicketVoteCodeResponse),
        (status = 400, description = "Malformed or ambiguous key (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event or ticket not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Ticket already used or rights already held (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id, user_id = auth_user.user_id))]
pub async fn claim_ticket_vote_code(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<ClaimTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    let prefix = normalize_ticket_key(
        &payload.ticket_key,
        state.config.store.ticket_key_min_length,
    )?;
    find_event(&state.db, event_id).await?;

    let txn = state.db.begin().await?;

    let candidates = transaction_item::Entity::find()
        .filter(transaction_item::Column::Key.starts_with(&prefix))
        .filter(
            transaction_item::Column::ItemId.in_subquery(
                SeaQuery::select()
                    .column(store_item::Column::Id)
                    .from(store_item::Entity)
                    .and_where(store_item::Column::EventId.eq(event_id))
                    .and_where(store_item::Column::IsTicket.eq(true))
                    .to_owned(),
            ),
        )
        .filter(
            transaction_item::Column::TransactionId.in_subquery(
                SeaQuery::select()
                    .column(store_transaction::Column::Id)
                    .from(store_transaction::Entity)
                    .and_where(store_transaction::Column::TimePaid.is_not_null())
                    .and_where(store_transaction::Column::TimeCancelled.is_null())
                    .to_owned(),
            ),
        )
        .limit(2u64)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    let ticket = match candidates.as_slice() {
        [] => return Err(AppError::NotFound("No paid ticket matches this key".into())),
        [ticket] => ticket,
        _ => {
            return Err(AppError::Validation(
                "Key prefix matches several tickets; enter more characters".into(),
            ));
        }
    };

    let already_held = ticket_vote_code::Entity::find()
        .filter(ticket_vote_code::Column::EventId.eq(event_id))
        .filter(ticket_vote_code::Column::UserId.eq(auth_user.user_id))
        .one(&txn)
        .await?
        .is_some();
    if already_held {
        return Err(AppError::Conflict(
            "You already have voting rights for this event".into(),
        ));
    }
    let ticket_used = ticket_vote_code::Entity::find()
        .filter(ticket_vote_code::Column::TicketId.eq(ticket.id))
        .one(&txn)
        .await?
        .is_some();
    if ticket_used {
        return Err(AppError::Conflict("This ticket has already been used".into()));
    }

    let model = ticket_vote_code::ActiveModel {
        event_id: Set(event_id),
        user_id: Set(auth_user.user_id),
        ticket_id: Set(ticket.id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("This ticket has already been used".into())
        }
        _ => AppError::from(e),
    })?;
    txn.commit().await?;

    tracing::info!(event_id, user_id = auth_user.user_id, ticket_id = model.ticket_id, "Ticket vote code claimed");
    Ok((StatusCode::CREATED, Json(TicketVoteCodeResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/{id}/vote-codes/mine",
    tag = "Voting Rights",
    operation_id = "getMyVoteCode",
    summary = "The caller's ticket vote code for an event",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Vote code", body = TicketVoteCodeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No vote code (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(event_id, user_id = auth_user.user_id))]
pub async fn get_my_vote_code(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<TicketVoteCodeResponse>, AppError> {
    let code = ticket_vote_code::Entity::find()
        .filter(ticket_vote_code::Column::EventId.eq(event_id))
        .filter(ticket_vote_code::Column::UserId.eq(auth_user.user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No vote code for this event".into()))?;
    Ok(Json(code.into()))
}

#[utoipa::path(
    post,
    path = "/{id}/vote-code-requests",
    tag = "Voting Rights",
    operation_id = "createVoteCodeRequest",
    summary = "Ask for voting rights without a ticket",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = VoteCodeRequestBody,
    responses(
        (status = 201, description = "Request created", body = VoteCodeRequestResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "A request already exists (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id, user_id = auth_user.user_id))]
pub async fn create_vote_code_request(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<VoteCodeRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    validate_request_text(&payload)?;
    find_event(&state.db, event_id).await?;

    let now = chrono::Utc::now();
    let model = vote_code_request::ActiveModel {
        event_id: Set(event_id),
        user_id: Set(auth_user.user_id),
        text: Set(payload.text.trim().to_string()),
        status: Set(RequestStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("You already have a request for this event".into())
        }
        _ => AppError::from(e),
    })?;

    Ok((StatusCode::CREATED, Json(VoteCodeRequestResponse::from(model))))
}

async fn find_own_request<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    user_id: i32,
) -> Result<vote_code_request::Model, AppError> {
    vote_code_request::Entity::find()
        .filter(vote_code_request::Column::EventId.eq(event_id))
        .filter(vote_code_request::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vote code request not found".into()))
}

#[utoipa::path(
    get,
    path = "/{id}/vote-code-requests/mine",
    tag = "Voting Rights",
    operation_id = "getMyVoteCodeRequest",
    summary = "The caller's vote code request",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Request", body = VoteCodeRequestResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No request (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(event_id, user_id = auth_user.user_id))]
pub async fn get_my_vote_code_request(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<VoteCodeRequestResponse>, AppError> {
    Ok(Json(
        find_own_request(&state.db, event_id, auth_user.user_id)
            .await?
            .into(),
    ))
}

#[utoipa::path(
    patch,
    path = "/{id}/vote-code-requests/mine",
    tag = "Voting Rights",
    operation_id = "updateMyVoteCodeRequest",
    summary = "Edit the caller's pending request",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = VoteCodeRequestBody,
    responses(
        (status = 200, description = "Request updated", body = VoteCodeRequestResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No request (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Request already handled (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id, user_id = auth_user.user_id))]
pub async fn update_my_vote_code_request(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<VoteCodeRequestBody>,
) -> Result<Json<VoteCodeRequestResponse>, AppError> {
    validate_request_text(&payload)?;

    // Hold the row so a concurrent accept or reject cannot slip in
    // between the status check and the edit.
    let txn = state.db.begin().await?;
    let existing = vote_code_request::Entity::find()
        .filter(vote_code_request::Column::EventId.eq(event_id))
        .filter(vote_code_request::Column::UserId.eq(auth_user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Vote code request not found".into()))?;
    if existing.status != RequestStatus::Pending {
        return Err(AppError::Conflict(
            "Only pending requests can be edited".into(),
        ));
    }
    let mut active: vote_code_request::ActiveModel = existing.into();
    active.text = Set(payload.text.trim().to_string());
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/vote-code-requests",
    tag = "Voting Rights",
    operation_id = "listVoteCodeRequests",
    summary = "List vote code requests of an event",
    description = "Requires `vote:manage`. Oldest first.",
    params(("id" = i32, Path, description = "Event ID"), VoteCodeRequestListQuery),
    responses(
        (status = 200, description = "Requests", body = VoteCodeRequestListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(event_id))]
pub async fn list_vote_code_requests(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppQuery(query): AppQuery<VoteCodeRequestListQuery>,
) -> Result<Json<VoteCodeRequestListResponse>, AppError> {
    auth_user.require_permission("vote:manage")?;
    let (page, per_page) = resolve_page(query.page, query.per_page);

    let mut select =
        vote_code_request::Entity::find().filter(vote_code_request::Column::EventId.eq(event_id));
    if let Some(status) = query.status {
        select = select.filter(vote_code_request::Column::Status.eq(status));
    }

    let total = select.clone().count(&state.db).await?;
    let data = select
        .order_by_asc(vote_code_request::Column::CreatedAt)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(VoteCodeRequestResponse::from)
        .collect();

    Ok(Json(VoteCodeRequestListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    put,
    path = "/{id}/status",
    tag = "Voting Rights",
    operation_id = "setVoteCodeRequestStatus",
    summary = "Accept or reject a vote code request",
    description = "Requires `vote:manage`. An accepted request grants voting rights for the event.",
    params(("id" = i32, Path, description = "Request ID")),
    request_body = SetRequestStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = VoteCodeRequestResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Request not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn set_vote_code_request_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<SetRequestStatusRequest>,
) -> Result<Json<VoteCodeRequestResponse>, AppError> {
    auth_user.require_permission("vote:manage")?;

    let existing = vote_code_request::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vote code request not found".into()))?;
    let mut active: vote_code_request::ActiveModel = existing.into();
    active.status = Set(payload.status);
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(&state.db).await?;

    tracing::info!(request_id = id, status = ?updated.status, by = auth_user.user_id, "Vote code request status changed");
    Ok(Json(updated.into()))
}
