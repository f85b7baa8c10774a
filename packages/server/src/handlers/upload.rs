use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use sea_orm::*;
use tracing::instrument;

use crate::config::StorageConfig;
use crate::entity::blob_ref::OWNER_UPLOAD;
use crate::entity::uploaded_file;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppQuery;
use crate::models::shared::validate_max_len;
use crate::models::upload::*;
use crate::state::AppState;
use crate::utils::event::find_event;
use crate::utils::upload::{
    UploadedPart, attach, detach_all, discard_parts, field_filename, file_response, find_slot,
    refs_by_owner, release_if_orphaned, store_field,
};

pub fn upload_body_limit(storage: &StorageConfig) -> DefaultBodyLimit {
    let limit = storage.max_blob_size.saturating_add(64 * 1024);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[derive(Default)]
struct ParsedUploadForm {
    description: Option<String>,
    file: Option<UploadedPart>,
}

async fn read_upload_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<ParsedUploadForm, AppError> {
    let mut form = ParsedUploadForm::default();
    let result = read_upload_fields(state, &mut multipart, &mut form).await;
    if let Err(e) = result {
        discard_parts(&state.db, state.file_store.as_ref(), form.file.iter()).await;
        return Err(e);
    }
    if let Some(ref description) = form.description
        && let Err(e) = validate_max_len(description, "description", 2000)
    {
        discard_parts(&state.db, state.file_store.as_ref(), form.file.iter()).await;
        return Err(e);
    }
    Ok(form)
}

async fn read_upload_fields(
    state: &AppState,
    multipart: &mut Multipart,
    form: &mut ParsedUploadForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "description" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read description: {e}")))?;
                form.description = Some(value);
            }
            UPLOAD_SLOT => {
                if form.file.is_some() {
                    return Err(AppError::Validation("Only one file per upload".into()));
                }
                let filename = field_filename(&field)?;
                let part = store_field(
                    field,
                    filename,
                    state.file_store.as_ref(),
                    state.config.storage.max_blob_size,
                )
                .await?;
                form.file = Some(part);
            }
            other => {
                return Err(AppError::Validation(format!("Unknown field '{other}'")));
            }
        }
    }
    Ok(())
}

async fn upload_response<C: ConnectionTrait>(
    db: &C,
    model: uploaded_file::Model,
) -> Result<UploadResponse, AppError> {
    let file = find_slot(db, OWNER_UPLOAD, model.id, UPLOAD_SLOT).await?;
    Ok(UploadResponse::new(model, file.as_ref()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Uploads",
    operation_id = "uploadFile",
    summary = "Upload a file for an event",
    description = "Requires `upload:manage`. Multipart with a `file` and an optional `description`.",
    params(UploadListQuery),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File uploaded", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query, multipart), fields(event_id = query.event_id))]
pub async fn upload_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UploadListQuery>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("upload:manage")?;
    find_event(&state.db, query.event_id).await?;

    let form = read_upload_form(&state, multipart).await?;
    let Some(ref part) = form.file else {
        return Err(AppError::Validation("A file is required".into()));
    };

    let result = async {
        let now = chrono::Utc::now();
        let txn = state.db.begin().await?;
        let model = uploaded_file::ActiveModel {
            event_id: Set(query.event_id),
            user_id: Set(auth_user.user_id),
            description: Set(form.description.clone().unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        let store = state.file_store.as_ref();
        attach(&txn, store, OWNER_UPLOAD, model.id, UPLOAD_SLOT, part).await?;
        txn.commit().await?;
        Ok::<_, AppError>(model)
    }
    .await;

    let model = match result {
        Ok(model) => model,
        Err(e) => {
            discard_parts(&state.db, state.file_store.as_ref(), form.file.iter()).await;
            return Err(e);
        }
    };
    tracing::info!(upload_id = model.id, event_id = model.event_id, "File uploaded");
    let response = upload_response(&state.db, model).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Uploads",
    operation_id = "listUploads",
    summary = "List an event's uploaded files",
    description = "Requires `upload:manage`. Newest first.",
    params(UploadListQuery),
    responses(
        (status = 200, description = "Uploads", body = Vec<UploadResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(event_id = query.event_id))]
pub async fn list_uploads(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UploadListQuery>,
) -> Result<Json<Vec<UploadResponse>>, AppError> {
    auth_user.require_permission("upload:manage")?;

    let uploads = uploaded_file::Entity::find()
        .filter(uploaded_file::Column::EventId.eq(query.event_id))
        .order_by_desc(uploaded_file::Column::CreatedAt)
        .order_by_desc(uploaded_file::Column::Id)
        .all(&state.db)
        .await?;
    let mut refs = refs_by_owner(
        &state.db,
        OWNER_UPLOAD,
        uploads.iter().map(|u| u.id).collect(),
    )
    .await?;

    Ok(Json(
        uploads
            .into_iter()
            .map(|u| {
                let file = refs.remove(&u.id).and_then(|r| r.into_iter().next());
                UploadResponse::new(u, file.as_ref())
            })
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}/file",
    tag = "Uploads",
    operation_id = "downloadUpload",
    summary = "Download an uploaded file",
    description = "Public; uploads are linked from event pages. Sends an `ETag` and answers `If-None-Match` with 304.",
    params(("id" = i32, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Upload not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers), fields(id))]
pub async fn download_upload(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let file = find_slot(&state.db, OWNER_UPLOAD, id, UPLOAD_SLOT)
        .await?
        .ok_or_else(|| AppError::NotFound("Upload not found".into()))?;
    file_response(&file, &headers, state.file_store.as_ref()).await
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Uploads",
    operation_id = "updateUpload",
    summary = "Replace an upload's file or description",
    description = "Requires `upload:manage`. The replaced file is deleted once nothing references it.",
    params(("id" = i32, Path, description = "Upload ID")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Upload updated", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Upload not found (NOT_FOUND)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(id))]
pub async fn update_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    auth_user.require_permission("upload:manage")?;
    uploaded_file::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Upload not found".into()))?;

    let form = read_upload_form(&state, multipart).await?;
    let result = async {
        let txn = state.db.begin().await?;
        let existing = uploaded_file::Entity::find_by_id(id)
            .lock(sea_orm::sea_query::LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Upload not found".into()))?;
        let mut active: uploaded_file::ActiveModel = existing.into();
        if let Some(ref description) = form.description {
            active.description = Set(description.clone());
        }
        active.updated_at = Set(chrono::Utc::now());
        let updated = active.update(&txn).await?;

        let replaced = match form.file {
            Some(ref part) => {
                let store = state.file_store.as_ref();
                attach(&txn, store, OWNER_UPLOAD, id, UPLOAD_SLOT, part).await?
            }
            None => None,
        };
        txn.commit().await?;
        Ok::<_, AppError>((updated, replaced))
    }
    .await;

    let (updated, replaced) = match result {
        Ok(done) => done,
        Err(e) => {
            discard_parts(&state.db, state.file_store.as_ref(), form.file.iter()).await;
            return Err(e);
        }
    };
    if let Some(hash) = replaced {
        release_if_orphaned(&state.db, state.file_store.as_ref(), &hash).await;
    }
    Ok(Json(upload_response(&state.db, updated).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Uploads",
    operation_id = "deleteUpload",
    summary = "Delete an upload and its file",
    description = "Requires `upload:manage`.",
    params(("id" = i32, Path, description = "Upload ID")),
    responses(
        (status = 204, description = "Upload deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Upload not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("upload:manage")?;

    let txn = state.db.begin().await?;
    uploaded_file::Entity::find_by_id(id)
        .lock(sea_orm::sea_query::LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Upload not found".into()))?;
    let hashes = detach_all(&txn, OWNER_UPLOAD, id).await?;
    uploaded_file::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    for hash in hashes {
        release_if_orphaned(&state.db, state.file_store.as_ref(), &hash).await;
    }
    tracing::info!(upload_id = id, by = auth_user.user_id, "Upload deleted");
    Ok(StatusCode::NO_CONTENT)
}
