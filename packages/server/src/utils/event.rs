use chrono::{DateTime, Utc};
use sea_orm::sea_query::LockType;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use crate::entity::{
    competition, compo, entry, event, ticket_vote_code, vote_code_request,
};
use crate::entity::vote_code_request::RequestStatus;
use crate::error::AppError;
use crate::extractors::auth::MaybeAuthUser;

/// Look up an event by ID, returning 404 if not found.
pub async fn find_event<C: ConnectionTrait>(db: &C, id: i32) -> Result<event::Model, AppError> {
    event::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

pub async fn find_event_for_update<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<event::Model, AppError> {
    event::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

pub async fn find_compo<C: ConnectionTrait>(db: &C, id: i32) -> Result<compo::Model, AppError> {
    compo::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Compo not found".into()))
}

/// Compo lookup honouring visibility: inactive compos are 404 for
/// everyone without `compo:manage`.
pub async fn find_visible_compo<C: ConnectionTrait>(
    db: &C,
    viewer: &MaybeAuthUser,
    id: i32,
) -> Result<compo::Model, AppError> {
    let compo = find_compo(db, id).await?;
    if !compo.active && !viewer.has_permission("compo:manage") {
        return Err(AppError::NotFound("Compo not found".into()));
    }
    Ok(compo)
}

pub async fn find_entry<C: ConnectionTrait>(db: &C, id: i32) -> Result<entry::Model, AppError> {
    entry::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))
}

pub async fn find_entry_for_update<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<entry::Model, AppError> {
    entry::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))
}

pub async fn find_competition<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<competition::Model, AppError> {
    competition::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Competition not found".into()))
}

/// Time-window flags of a compo at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompoWindow {
    pub is_adding_open: bool,
    pub is_editing_open: bool,
    pub is_voting_open: bool,
    pub has_voting_started: bool,
    pub has_voting_ended: bool,
}

impl CompoWindow {
    pub fn at(compo: &compo::Model, now: DateTime<Utc>) -> Self {
        Self {
            is_adding_open: now < compo.adding_end,
            is_editing_open: now < compo.editing_end,
            is_voting_open: compo.voting_start <= now && now < compo.voting_end,
            has_voting_started: compo.voting_start <= now,
            has_voting_ended: compo.voting_end <= now,
        }
    }

    pub fn now(compo: &compo::Model) -> Self {
        Self::at(compo, Utc::now())
    }
}

/// Whether `user_id` may vote in compos of `event_id`: either a claimed
/// ticket or an accepted vote code request.
pub async fn has_voting_rights<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    user_id: i32,
) -> Result<bool, AppError> {
    let has_ticket = ticket_vote_code::Entity::find()
        .filter(ticket_vote_code::Column::EventId.eq(event_id))
        .filter(ticket_vote_code::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .is_some();
    if has_ticket {
        return Ok(true);
    }
    Ok(vote_code_request::Entity::find()
        .filter(vote_code_request::Column::EventId.eq(event_id))
        .filter(vote_code_request::Column::UserId.eq(user_id))
        .filter(vote_code_request::Column::Status.eq(RequestStatus::Accepted))
        .one(db)
        .await?
        .is_some())
}
