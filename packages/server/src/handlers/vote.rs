use std::collections::{HashMap, HashSet};

use axum::Json;
use axum::extract::{Path, State};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{entry, user, vote, vote_group};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::vote::*;
use crate::state::AppState;
use crate::utils::event::{CompoWindow, find_compo, has_voting_rights};

#[utoipa::path(
    get,
    path = "/{id}/votes/mine",
    tag = "Voting",
    operation_id = "getMyVotes",
    summary = "The caller's ballot for a compo",
    params(("id" = i32, Path, description = "Compo ID")),
    responses(
        (status = 200, description = "Ballot (empty if not voted)", body = BallotResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(compo_id, user_id = auth_user.user_id))]
pub async fn get_my_votes(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(compo_id): Path<i32>,
) -> Result<Json<BallotResponse>, AppError> {
    find_compo(&state.db, compo_id).await?;

    let group = vote_group::Entity::find()
        .filter(vote_group::Column::UserId.eq(auth_user.user_id))
        .filter(vote_group::Column::CompoId.eq(compo_id))
        .one(&state.db)
        .await?;

    let Some(group) = group else {
        return Ok(Json(BallotResponse {
            compo_id,
            entry_ids: Vec::new(),
            created_at: None,
        }));
    };

    let entry_ids: Vec<i32> = vote::Entity::find()
        .select_only()
        .column(vote::Column::EntryId)
        .filter(vote::Column::GroupId.eq(group.id))
        .order_by_asc(vote::Column::Rank)
        .into_tuple()
        .all(&state.db)
        .await?;

    Ok(Json(BallotResponse {
        compo_id,
        entry_ids,
        created_at: Some(group.created_at),
    }))
}

#[utoipa::path(
    put,
    path = "/{id}/votes",
    tag = "Voting",
    operation_id = "submitVotes",
    summary = "Submit or replace a ballot",
    description = "Ranks entries in the given order, best first. Requires voting rights for the compo's event \
        (a claimed ticket or an accepted vote code request). The compo must be active, votable and in its voting \
        window. Every entry must belong to the compo and must not be disqualified. A previous ballot is replaced \
        atomically.",
    params(("id" = i32, Path, description = "Compo ID")),
    request_body = SubmitVotesRequest,
    responses(
        (status = 200, description = "Ballot stored", body = BallotResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "No voting rights (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Concurrent ballot submission (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(compo_id, user_id = auth_user.user_id))]
pub async fn submit_votes(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(compo_id): Path<i32>,
    AppJson(payload): AppJson<SubmitVotesRequest>,
) -> Result<Json<BallotResponse>, AppError> {
    validate_submit_votes(&payload)?;

    let compo = find_compo(&state.db, compo_id).await?;
    if !compo.active {
        return Err(AppError::NotFound("Compo not found".into()));
    }
    if !compo.is_votable {
        return Err(AppError::Validation("This compo is not voted on".into()));
    }
    if !CompoWindow::now(&compo).is_voting_open {
        return Err(AppError::Validation(
            "Voting is not open for this compo".into(),
        ));
    }
    if !has_voting_rights(&state.db, compo.event_id, auth_user.user_id).await? {
        return Err(AppError::PermissionDenied);
    }

    let entries = entry::Entity::find()
        .filter(entry::Column::Id.is_in(payload.entry_ids.clone()))
        .filter(entry::Column::CompoId.eq(compo_id))
        .all(&state.db)
        .await?;
    let found: HashSet<i32> = entries.iter().map(|e| e.id).collect();
    if let Some(missing) = payload.entry_ids.iter().find(|id| !found.contains(id)) {
        return Err(AppError::Validation(format!(
            "Entry {missing} does not belong to this compo"
        )));
    }
    if let Some(dq) = entries.iter().find(|e| e.disqualified) {
        return Err(AppError::Validation(format!(
            "Entry {} is disqualified",
            dq.id
        )));
    }

    let txn = state.db.begin().await?;

    let previous = vote_group::Entity::find()
        .filter(vote_group::Column::UserId.eq(auth_user.user_id))
        .filter(vote_group::Column::CompoId.eq(compo_id))
        .lock(sea_orm::sea_query::LockType::Update)
        .one(&txn)
        .await?;
    if let Some(previous) = previous {
        vote::Entity::delete_many()
            .filter(vote::Column::GroupId.eq(previous.id))
            .exec(&txn)
            .await?;
        vote_group::Entity::delete_by_id(previous.id)
            .exec(&txn)
            .await?;
    }

    let group = vote_group::ActiveModel {
        user_id: Set(auth_user.user_id),
        compo_id: Set(compo_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Another ballot submission is in progress".into())
        }
        _ => AppError::from(e),
    })?;

    let votes = payload
        .entry_ids
        .iter()
        .zip(1..)
        .map(|(&entry_id, rank)| vote::ActiveModel {
            group_id: Set(group.id),
            entry_id: Set(entry_id),
            compo_id: Set(compo_id),
            rank: Set(rank),
            ..Default::default()
        });
    vote::Entity::insert_many(votes)
        .exec_without_returning(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        compo_id,
        user_id = auth_user.user_id,
        entries = payload.entry_ids.len(),
        "Ballot stored"
    );
    Ok(Json(BallotResponse {
        compo_id,
        entry_ids: payload.entry_ids,
        created_at: Some(group.created_at),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/vote-groups",
    tag = "Voting",
    operation_id = "listVoteGroups",
    summary = "All ballots cast in a compo",
    description = "Requires `vote:manage`. For auditing.",
    params(("id" = i32, Path, description = "Compo ID")),
    responses(
        (status = 200, description = "Ballots", body = Vec<VoteGroupResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(compo_id))]
pub async fn list_vote_groups(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(compo_id): Path<i32>,
) -> Result<Json<Vec<VoteGroupResponse>>, AppError> {
    auth_user.require_permission("vote:manage")?;
    find_compo(&state.db, compo_id).await?;

    let groups = vote_group::Entity::find()
        .filter(vote_group::Column::CompoId.eq(compo_id))
        .order_by_asc(vote_group::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let votes = vote::Entity::find()
        .filter(vote::Column::CompoId.eq(compo_id))
        .order_by_asc(vote::Column::GroupId)
        .order_by_asc(vote::Column::Rank)
        .all(&state.db)
        .await?;
    let mut ballots: HashMap<i32, Vec<i32>> = HashMap::new();
    for v in votes {
        ballots.entry(v.group_id).or_default().push(v.entry_id);
    }

    let user_ids: Vec<i32> = groups.iter().map(|g| g.user_id).collect();
    let usernames: HashMap<i32, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    Ok(Json(
        groups
            .into_iter()
            .map(|g| VoteGroupResponse {
                id: g.id,
                user_id: g.user_id,
                username: usernames.get(&g.user_id).cloned().unwrap_or_default(),
                entry_ids: ballots.remove(&g.id).unwrap_or_default(),
                created_at: g.created_at,
            })
            .collect(),
    ))
}
