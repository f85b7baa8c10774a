use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;
use tracing::instrument;

use crate::config::StorageConfig;
use crate::entity::blob_ref::OWNER_ENTRY;
use crate::entity::{compo, entry, event, vote};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, MaybeAuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::compo::CompoListQuery;
use crate::models::entry::*;
use crate::state::AppState;
use crate::utils::event::{
    CompoWindow, find_compo, find_entry, find_entry_for_update, find_event, find_visible_compo,
};
use crate::utils::filename::has_allowed_extension;
use crate::utils::results::compo_results as ranked_compo_results;
use crate::utils::upload::{
    UploadedPart, attach, detach_all, discard_parts, field_filename, file_response, find_slot,
    refs_by_owner, release_if_orphaned, store_field,
};

/// Room for all three files plus the text fields.
pub fn entry_body_limit(storage: &StorageConfig) -> DefaultBodyLimit {
    let limit = storage
        .max_blob_size
        .saturating_mul(3)
        .saturating_add(1024 * 1024);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[derive(Default)]
struct ParsedEntryForm {
    fields: EntryFields,
    files: Vec<(EntrySlot, UploadedPart)>,
}

impl ParsedEntryForm {
    fn parts(&self) -> impl Iterator<Item = &UploadedPart> {
        self.files.iter().map(|(_, p)| p)
    }

    fn has(&self, slot: EntrySlot) -> bool {
        self.files.iter().any(|(s, _)| *s == slot)
    }
}

/// Read the multipart stream. Files are checked against the compo's
/// format list and size limit and stored as they arrive; on failure every
/// file stored so far is discarded.
async fn read_entry_form(
    state: &AppState,
    compo: &compo::Model,
    mut multipart: Multipart,
) -> Result<ParsedEntryForm, AppError> {
    let mut form = ParsedEntryForm::default();
    let result = read_entry_fields(state, compo, &mut multipart, &mut form).await;
    if let Err(e) = result {
        discard_parts(&state.db, state.file_store.as_ref(), form.parts()).await;
        return Err(e);
    }
    Ok(form)
}

async fn read_entry_fields(
    state: &AppState,
    compo: &compo::Model,
    multipart: &mut Multipart,
    form: &mut ParsedEntryForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(slot) = EntrySlot::from_field(&name) else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
            if !form.fields.set(&name, value) {
                return Err(AppError::Validation(format!("Unknown field '{name}'")));
            }
            continue;
        };

        if form.has(slot) {
            return Err(AppError::Validation(format!(
                "Field '{name}' given more than once"
            )));
        }
        let filename = field_filename(&field)?;
        let formats = slot.formats(compo);
        if !has_allowed_extension(&filename, formats) {
            return Err(AppError::Validation(format!(
                "{name} must have one of the extensions: {}",
                formats.replace('|', ", ")
            )));
        }
        let limit = std::cmp::Ord::min(slot.max_size(compo), state.config.storage.max_blob_size);
        let part = store_field(field, filename, state.file_store.as_ref(), limit).await?;
        form.files.push((slot, part));
    }
    Ok(())
}

/// Anyone may see an entry once voting in its compo has started or the
/// event is archived; before that only its owner and entry managers.
async fn can_view_entry<C: ConnectionTrait>(
    db: &C,
    viewer: &MaybeAuthUser,
    compo: &compo::Model,
    entry: &entry::Model,
) -> Result<bool, AppError> {
    if viewer.has_permission("entry:manage") || viewer.user_id() == Some(entry.user_id) {
        return Ok(true);
    }
    public_entries_visible(db, compo).await
}

async fn public_entries_visible<C: ConnectionTrait>(
    db: &C,
    compo: &compo::Model,
) -> Result<bool, AppError> {
    if !compo.active {
        return Ok(false);
    }
    if CompoWindow::now(compo).has_voting_started {
        return Ok(true);
    }
    Ok(find_event(db, compo.event_id).await?.archived)
}

async fn entry_response<C: ConnectionTrait>(
    db: &C,
    model: entry::Model,
) -> Result<EntryResponse, AppError> {
    let mut refs = refs_by_owner(db, OWNER_ENTRY, vec![model.id]).await?;
    let own = refs.remove(&model.id).unwrap_or_default();
    Ok(EntryResponse::new(model, &own))
}

#[utoipa::path(
    post,
    path = "/{id}/entries",
    tag = "Entries",
    operation_id = "createEntry",
    summary = "Submit an entry",
    description = "Multipart upload with fields `name`, `creator`, `description`, `platform`, `youtube_url` and files \
        `entryfile` (required), `sourcefile`, `imagefile`. Allowed while the compo is active and adding is open; \
        `entry:manage` bypasses the schedule. Files must match the compo's format lists and size limits, \
        and the image must follow the compo's `thumbnail_pref`.",
    params(("id" = i32, Path, description = "Compo ID")),
    request_body(content = EntryForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Entry created", body = EntryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(compo_id, user_id = auth_user.user_id))]
pub async fn create_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(compo_id): Path<i32>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let compo = find_compo(&state.db, compo_id).await?;
    if !auth_user.has_permission("entry:manage") {
        if !compo.active {
            return Err(AppError::NotFound("Compo not found".into()));
        }
        if !CompoWindow::now(&compo).is_adding_open {
            return Err(AppError::Validation(
                "Adding entries to this compo has closed".into(),
            ));
        }
    }

    let form = read_entry_form(&state, &compo, multipart).await?;
    match insert_entry(&state, &auth_user, &compo, &form).await {
        Ok(model) => {
            tracing::info!(entry_id = model.id, compo_id, "Entry created");
            let response = entry_response(&state.db, model).await?;
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            discard_parts(&state.db, state.file_store.as_ref(), form.parts()).await;
            Err(e)
        }
    }
}

async fn insert_entry(
    state: &AppState,
    auth_user: &AuthUser,
    compo: &compo::Model,
    form: &ParsedEntryForm,
) -> Result<entry::Model, AppError> {
    let changes = check_entry_fields(&form.fields, true)?;
    let uploaded_image = form.has(EntrySlot::Imagefile);
    check_thumbnail_policy(
        compo.thumbnail_pref,
        uploaded_image,
        SlotPresence {
            entryfile: form.has(EntrySlot::Entryfile),
            imagefile: uploaded_image,
        },
    )?;

    let now = chrono::Utc::now();
    let txn = state.db.begin().await?;
    let model = entry::ActiveModel {
        compo_id: Set(compo.id),
        user_id: Set(auth_user.user_id),
        name: Set(changes.name.unwrap_or_default()),
        description: Set(changes.description.unwrap_or_default()),
        creator: Set(changes.creator.unwrap_or_default()),
        platform: Set(changes.platform.flatten()),
        youtube_url: Set(changes.youtube_url.flatten()),
        disqualified: Set(false),
        disqualified_reason: Set(None),
        archive_score: Set(None),
        archive_rank: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for (slot, part) in &form.files {
        attach(
            &txn,
            state.file_store.as_ref(),
            OWNER_ENTRY,
            model.id,
            slot.as_str(),
            part,
        )
        .await?;
    }
    txn.commit().await?;
    Ok(model)
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Entries",
    operation_id = "updateEntry",
    summary = "Update an entry",
    description = "Partial multipart update with the same fields as `createEntry`. The owner may edit while the compo's \
        editing window is open; `entry:manage` may edit at any time. A new file replaces the old one, which is \
        deleted once nothing references it.",
    params(("id" = i32, Path, description = "Entry ID")),
    request_body(content = EntryForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Entry updated", body = EntryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(id, user_id = auth_user.user_id))]
pub async fn update_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<EntryResponse>, AppError> {
    let existing = find_entry(&state.db, id).await?;
    let compo = find_compo(&state.db, existing.compo_id).await?;
    if !auth_user.has_permission("entry:manage") {
        if existing.user_id != auth_user.user_id {
            return Err(AppError::PermissionDenied);
        }
        if !compo.active || !CompoWindow::now(&compo).is_editing_open {
            return Err(AppError::Validation(
                "Editing entries in this compo has closed".into(),
            ));
        }
    }

    let form = read_entry_form(&state, &compo, multipart).await?;
    let replaced = match apply_entry_update(&state, id, &compo, &form).await {
        Ok(replaced) => replaced,
        Err(e) => {
            discard_parts(&state.db, state.file_store.as_ref(), form.parts()).await;
            return Err(e);
        }
    };
    for hash in replaced {
        release_if_orphaned(&state.db, state.file_store.as_ref(), &hash).await;
    }

    let updated = find_entry(&state.db, id).await?;
    Ok(Json(entry_response(&state.db, updated).await?))
}

/// Returns hashes that are no longer referenced by this entry.
async fn apply_entry_update(
    state: &AppState,
    id: i32,
    compo: &compo::Model,
    form: &ParsedEntryForm,
) -> Result<Vec<String>, AppError> {
    let changes = check_entry_fields(&form.fields, false)?;

    let txn = state.db.begin().await?;
    let existing = find_entry_for_update(&txn, id).await?;

    let uploaded_image = form.has(EntrySlot::Imagefile);
    let mut presence = SlotPresence {
        entryfile: form.has(EntrySlot::Entryfile),
        imagefile: uploaded_image,
    };
    if !presence.entryfile {
        presence.entryfile = find_slot(&txn, OWNER_ENTRY, id, EntrySlot::Entryfile.as_str())
            .await?
            .is_some();
    }
    if !presence.imagefile {
        presence.imagefile = find_slot(&txn, OWNER_ENTRY, id, EntrySlot::Imagefile.as_str())
            .await?
            .is_some();
    }
    check_thumbnail_policy(compo.thumbnail_pref, uploaded_image, presence)?;

    if !changes.is_empty() || !form.files.is_empty() {
        let mut active: entry::ActiveModel = existing.into();
        if let Some(v) = changes.name {
            active.name = Set(v);
        }
        if let Some(v) = changes.description {
            active.description = Set(v);
        }
        if let Some(v) = changes.creator {
            active.creator = Set(v);
        }
        if let Some(v) = changes.platform {
            active.platform = Set(v);
        }
        if let Some(v) = changes.youtube_url {
            active.youtube_url = Set(v);
        }
        active.updated_at = Set(chrono::Utc::now());
        active.update(&txn).await?;
    }

    let mut replaced = Vec::new();
    for (slot, part) in &form.files {
        let store = state.file_store.as_ref();
        if let Some(old) = attach(&txn, store, OWNER_ENTRY, id, slot.as_str(), part).await? {
            replaced.push(old);
        }
    }
    txn.commit().await?;
    Ok(replaced)
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Entries",
    operation_id = "deleteEntry",
    summary = "Delete an entry",
    description = "The owner may delete while adding is open; `entry:manage` at any time. Votes for the entry and its files go with it.",
    params(("id" = i32, Path, description = "Entry ID")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 400, description = "Adding has closed (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user_id = auth_user.user_id))]
pub async fn delete_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let txn = state.db.begin().await?;
    let existing = find_entry_for_update(&txn, id).await?;
    if !auth_user.has_permission("entry:manage") {
        if existing.user_id != auth_user.user_id {
            return Err(AppError::PermissionDenied);
        }
        let compo = find_compo(&txn, existing.compo_id).await?;
        if !compo.active || !CompoWindow::now(&compo).is_adding_open {
            return Err(AppError::Validation(
                "Entries can only be deleted while adding is open".into(),
            ));
        }
    }

    vote::Entity::delete_many()
        .filter(vote::Column::EntryId.eq(id))
        .exec(&txn)
        .await?;
    let hashes = detach_all(&txn, OWNER_ENTRY, id).await?;
    entry::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    for hash in hashes {
        release_if_orphaned(&state.db, state.file_store.as_ref(), &hash).await;
    }
    tracing::info!(entry_id = id, by = auth_user.user_id, "Entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{id}/entries",
    tag = "Entries",
    operation_id = "listCompoEntries",
    summary = "List a compo's entries",
    description = "Public once voting has started or the event is archived; empty before that. `entry:manage` always sees every entry.",
    params(("id" = i32, Path, description = "Compo ID")),
    responses(
        (status = 200, description = "Entries", body = Vec<EntryResponse>),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer), fields(compo_id))]
pub async fn list_compo_entries(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(compo_id): Path<i32>,
) -> Result<Json<Vec<EntryResponse>>, AppError> {
    let manager = viewer.has_permission("entry:manage");
    let compo = if manager {
        find_compo(&state.db, compo_id).await?
    } else {
        find_visible_compo(&state.db, &viewer, compo_id).await?
    };
    if !manager && !public_entries_visible(&state.db, &compo).await? {
        return Ok(Json(Vec::new()));
    }

    let entries = entry::Entity::find()
        .filter(entry::Column::CompoId.eq(compo_id))
        .order_by_asc(entry::Column::Id)
        .all(&state.db)
        .await?;
    let refs = refs_by_owner(&state.db, OWNER_ENTRY, entries.iter().map(|e| e.id).collect()).await?;
    Ok(Json(EntryResponse::many(entries, &refs)))
}

#[utoipa::path(
    get,
    path = "/mine",
    tag = "Entries",
    operation_id = "listMyEntries",
    summary = "List the caller's entries",
    params(CompoListQuery),
    responses(
        (status = 200, description = "Own entries, newest first", body = Vec<EntryResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_my_entries(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CompoListQuery>,
) -> Result<Json<Vec<EntryResponse>>, AppError> {
    let mut select = entry::Entity::find().filter(entry::Column::UserId.eq(auth_user.user_id));
    if let Some(event_id) = query.event_id {
        select = select.filter(
            entry::Column::CompoId.in_subquery(
                SeaQuery::select()
                    .column(compo::Column::Id)
                    .from(compo::Entity)
                    .and_where(compo::Column::EventId.eq(event_id))
                    .to_owned(),
            ),
        );
    }
    let entries = select
        .order_by_desc(entry::Column::CreatedAt)
        .all(&state.db)
        .await?;
    let refs = refs_by_owner(&state.db, OWNER_ENTRY, entries.iter().map(|e| e.id).collect()).await?;
    Ok(Json(EntryResponse::many(entries, &refs)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Entries",
    operation_id = "getEntry",
    summary = "Get an entry",
    params(("id" = i32, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Entry", body = EntryResponse),
        (status = 404, description = "Entry not found or not yet public (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer), fields(id))]
pub async fn get_entry(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EntryResponse>, AppError> {
    let model = find_entry(&state.db, id).await?;
    let compo = find_compo(&state.db, model.compo_id).await?;
    if !can_view_entry(&state.db, &viewer, &compo, &model).await? {
        return Err(AppError::NotFound("Entry not found".into()));
    }
    Ok(Json(entry_response(&state.db, model).await?))
}

#[utoipa::path(
    get,
    path = "/{id}/files/{slot}",
    tag = "Entries",
    operation_id = "downloadEntryFile",
    summary = "Download an entry file",
    description = "Streams `entryfile`, `sourcefile` or `imagefile`. Sends an `ETag` and answers `If-None-Match` with 304.",
    params(
        ("id" = i32, Path, description = "Entry ID"),
        ("slot" = EntrySlot, Path, description = "Which file"),
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Entry or file not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer, headers), fields(id, slot = slot.as_str()))]
pub async fn download_entry_file(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path((id, slot)): Path<(i32, EntrySlot)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let model = find_entry(&state.db, id).await?;
    let compo = find_compo(&state.db, model.compo_id).await?;
    if !can_view_entry(&state.db, &viewer, &compo, &model).await? {
        return Err(AppError::NotFound("Entry not found".into()));
    }
    let file = find_slot(&state.db, OWNER_ENTRY, id, slot.as_str())
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;
    file_response(&file, &headers, state.file_store.as_ref()).await
}

#[utoipa::path(
    post,
    path = "/{id}/disqualify",
    tag = "Entries",
    operation_id = "disqualifyEntry",
    summary = "Disqualify an entry",
    description = "Requires `entry:manage`. Disqualified entries score -1 and rank after every qualified entry.",
    params(("id" = i32, Path, description = "Entry ID")),
    request_body = DisqualifyEntryRequest,
    responses(
        (status = 200, description = "Entry disqualified", body = EntryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn disqualify_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<DisqualifyEntryRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    auth_user.require_permission("entry:manage")?;
    let reason = payload.reason.trim();
    if reason.is_empty() || reason.chars().count() > 255 {
        return Err(AppError::Validation("Reason must be 1-255 characters".into()));
    }

    let updated = set_disqualification(&state.db, id, Some(reason.to_string())).await?;
    tracing::info!(entry_id = id, by = auth_user.user_id, "Entry disqualified");
    Ok(Json(entry_response(&state.db, updated).await?))
}

#[utoipa::path(
    post,
    path = "/{id}/requalify",
    tag = "Entries",
    operation_id = "requalifyEntry",
    summary = "Lift a disqualification",
    description = "Requires `entry:manage`.",
    params(("id" = i32, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Entry requalified", body = EntryResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn requalify_entry(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EntryResponse>, AppError> {
    auth_user.require_permission("entry:manage")?;
    let updated = set_disqualification(&state.db, id, None).await?;
    tracing::info!(entry_id = id, by = auth_user.user_id, "Entry requalified");
    Ok(Json(entry_response(&state.db, updated).await?))
}

async fn set_disqualification(
    db: &DatabaseConnection,
    id: i32,
    reason: Option<String>,
) -> Result<entry::Model, AppError> {
    let existing = find_entry(db, id).await?;
    let mut active: entry::ActiveModel = existing.into();
    active.disqualified = Set(reason.is_some());
    active.disqualified_reason = Set(reason);
    active.updated_at = Set(chrono::Utc::now());
    Ok(active.update(db).await?)
}

#[utoipa::path(
    put,
    path = "/{id}/archive",
    tag = "Entries",
    operation_id = "setEntryArchiveFields",
    summary = "Set archived score and rank",
    description = "Requires `entry:manage`. Set values override the computed score and rank; `null` clears an override.",
    params(("id" = i32, Path, description = "Entry ID")),
    request_body = SetArchiveFieldsRequest,
    responses(
        (status = 200, description = "Entry updated", body = EntryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn set_archive_fields(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<SetArchiveFieldsRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    auth_user.require_permission("entry:manage")?;
    validate_archive_fields(&payload)?;

    let existing = find_entry(&state.db, id).await?;
    let mut active: entry::ActiveModel = existing.into();
    if let Some(score) = payload.archive_score {
        active.archive_score = Set(score);
    }
    if let Some(rank) = payload.archive_rank {
        active.archive_rank = Set(rank);
    }
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(&state.db).await?;

    Ok(Json(entry_response(&state.db, updated).await?))
}

#[utoipa::path(
    get,
    path = "/{id}/results",
    tag = "Entries",
    operation_id = "getCompoResults",
    summary = "Ranked results of a compo",
    description = "Score is the sum of `1/rank` over all ballots; equal scores share a dense rank and disqualified \
        entries come last with score -1. Archived values override computed ones. Public once voting has ended and \
        `show_voting_results` is set, or when the event is archived; `entry:manage` always.",
    params(("id" = i32, Path, description = "Compo ID")),
    responses(
        (status = 200, description = "Entries by rank", body = Vec<EntryResultResponse>),
        (status = 403, description = "Results not public yet (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Compo not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer), fields(compo_id))]
pub async fn compo_results(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(compo_id): Path<i32>,
) -> Result<Json<Vec<EntryResultResponse>>, AppError> {
    let manager = viewer.has_permission("entry:manage");
    let compo = if manager {
        find_compo(&state.db, compo_id).await?
    } else {
        find_visible_compo(&state.db, &viewer, compo_id).await?
    };
    if !manager {
        let event: event::Model = find_event(&state.db, compo.event_id).await?;
        let window = CompoWindow::now(&compo);
        let public = event.archived || (compo.show_voting_results && window.has_voting_ended);
        if !public {
            return Err(AppError::PermissionDenied);
        }
    }

    let ranked = ranked_compo_results(&state.db, compo_id).await?;
    let mut refs = refs_by_owner(
        &state.db,
        OWNER_ENTRY,
        ranked.iter().map(|r| r.item.id).collect(),
    )
    .await?;

    let results = ranked
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
    Ok(Json(results))
}
