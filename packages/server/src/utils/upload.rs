use std::collections::HashMap;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use common::storage::{BoxReader, ContentHash, FileStore, StoredFile};
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect,
    Set, TransactionSession, TransactionTrait,
};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::entity::{blob_object, blob_ref};
use crate::error::AppError;
use crate::utils::filename::validate_upload_filename;

/// A multipart file that has been written to the file store but is not
/// yet referenced by any row. The spooled copy lives as long as the part
/// so the content can be stored again if it was cleaned up in between.
#[derive(Debug)]
pub struct UploadedPart {
    pub stored: StoredFile,
    pub filename: String,
    pub content_type: Option<String>,
    spool: TempPath,
}

/// Validated filename of a multipart file field.
pub fn field_filename(field: &Field<'_>) -> Result<String, AppError> {
    let raw = field
        .file_name()
        .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
    validate_upload_filename(raw)
        .map(str::to_string)
        .map_err(|e| AppError::Validation(e.to_string()))
}

async fn open_spool(spool: &TempPath) -> Result<BoxReader, AppError> {
    let file = tokio::fs::File::open(spool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to reopen spooled upload: {e}")))?;
    Ok(Box::new(file))
}

/// Spool a multipart field to a temp file, then hand it to the store.
/// `limit` aborts oversized uploads early.
pub async fn store_field(
    mut field: Field<'_>,
    filename: String,
    store: &dyn FileStore,
    limit: u64,
) -> Result<UploadedPart, AppError> {
    let (file, spool) = tempfile::Builder::new()
        .prefix("instanssi-upload-")
        .tempfile()
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?
        .into_parts();
    let mut temp_file = tokio::fs::File::from_std(file);

    let mut total: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
    {
        total += chunk.len() as u64;
        if total > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }
        temp_file
            .write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
    }
    temp_file
        .flush()
        .await
        .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
    drop(temp_file);

    if total == 0 {
        return Err(AppError::Validation(format!("File '{filename}' is empty")));
    }

    let stored = store.put_stream(open_spool(&spool).await?, Some(limit)).await?;
    let content_type = mime_guess::from_path(&filename)
        .first()
        .map(|m| m.to_string());
    Ok(UploadedPart {
        stored,
        filename,
        content_type,
        spool,
    })
}

/// Make sure `stored` has a `blob_object` row and lock it until the
/// surrounding transaction ends.
async fn lock_blob_object<C: ConnectionTrait>(
    db: &C,
    stored: &StoredFile,
) -> Result<(), AppError> {
    blob_object::Entity::insert(blob_object::ActiveModel {
        content_hash: Set(stored.hash.to_hex()),
        size: Set(i64::try_from(stored.size).unwrap_or(i64::MAX)),
        created_at: Set(Utc::now()),
    })
    .on_conflict(
        OnConflict::column(blob_object::Column::ContentHash)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    blob_object::Entity::find_by_id(stored.hash.to_hex())
        .lock(LockType::Update)
        .one(db)
        .await?;
    Ok(())
}

/// Point `(owner_type, owner_id, slot)` at an uploaded file. Returns the
/// content hash the slot referenced before, if it was replaced.
///
/// Must run inside a transaction: the `blob_object` row stays locked until
/// commit so [`release_if_orphaned`] cannot remove the file underneath.
pub async fn attach<C: ConnectionTrait>(
    db: &C,
    store: &dyn FileStore,
    owner_type: &str,
    owner_id: i32,
    slot: &str,
    part: &UploadedPart,
) -> Result<Option<String>, AppError> {
    let hash = part.stored.hash.to_hex();
    let size = i64::try_from(part.stored.size).unwrap_or(i64::MAX);
    let now = Utc::now();

    lock_blob_object(db, &part.stored).await?;
    if !store.exists(&part.stored.hash).await? {
        tracing::debug!(%hash, "Stored file was cleaned up concurrently, storing again");
        store.put_stream(open_spool(&part.spool).await?, None).await?;
    }

    let existing = find_slot(db, owner_type, owner_id, slot).await?;

    match existing {
        Some(old) => {
            let previous = old.content_hash.clone();
            let mut active: blob_ref::ActiveModel = old.into();
            active.content_hash = Set(hash.clone());
            active.filename = Set(part.filename.clone());
            active.content_type = Set(part.content_type.clone());
            active.size = Set(size);
            active.created_at = Set(now);
            sea_orm::ActiveModelTrait::update(active, db).await?;
            Ok((previous != hash).then_some(previous))
        }
        None => {
            blob_ref::Entity::insert(blob_ref::ActiveModel {
                id: Set(Uuid::now_v7()),
                owner_type: Set(owner_type.to_string()),
                owner_id: Set(owner_id),
                slot: Set(slot.to_string()),
                content_hash: Set(hash),
                filename: Set(part.filename.clone()),
                content_type: Set(part.content_type.clone()),
                size: Set(size),
                created_at: Set(now),
            })
            .exec_without_returning(db)
            .await?;
            Ok(None)
        }
    }
}

pub async fn find_slot<C: ConnectionTrait>(
    db: &C,
    owner_type: &str,
    owner_id: i32,
    slot: &str,
) -> Result<Option<blob_ref::Model>, AppError> {
    Ok(blob_ref::Entity::find()
        .filter(blob_ref::Column::OwnerType.eq(owner_type))
        .filter(blob_ref::Column::OwnerId.eq(owner_id))
        .filter(blob_ref::Column::Slot.eq(slot))
        .one(db)
        .await?)
}

/// Remove one slot. Returns the hash it referenced.
pub async fn detach<C: ConnectionTrait>(
    db: &C,
    owner_type: &str,
    owner_id: i32,
    slot: &str,
) -> Result<Option<String>, AppError> {
    let Some(existing) = find_slot(db, owner_type, owner_id, slot).await? else {
        return Ok(None);
    };
    blob_ref::Entity::delete_by_id(existing.id).exec(db).await?;
    Ok(Some(existing.content_hash))
}

/// Remove every slot of an owner. Returns the referenced hashes.
pub async fn detach_all<C: ConnectionTrait>(
    db: &C,
    owner_type: &str,
    owner_id: i32,
) -> Result<Vec<String>, AppError> {
    let refs = blob_ref::Entity::find()
        .filter(blob_ref::Column::OwnerType.eq(owner_type))
        .filter(blob_ref::Column::OwnerId.eq(owner_id))
        .all(db)
        .await?;
    blob_ref::Entity::delete_many()
        .filter(blob_ref::Column::OwnerType.eq(owner_type))
        .filter(blob_ref::Column::OwnerId.eq(owner_id))
        .exec(db)
        .await?;
    Ok(refs.into_iter().map(|r| r.content_hash).collect())
}

/// All slots of the given owners, grouped by owner id.
pub async fn refs_by_owner<C: ConnectionTrait>(
    db: &C,
    owner_type: &str,
    owner_ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<blob_ref::Model>>, AppError> {
    let mut grouped: HashMap<i32, Vec<blob_ref::Model>> = HashMap::new();
    if owner_ids.is_empty() {
        return Ok(grouped);
    }
    let refs = blob_ref::Entity::find()
        .filter(blob_ref::Column::OwnerType.eq(owner_type))
        .filter(blob_ref::Column::OwnerId.is_in(owner_ids))
        .all(db)
        .await?;
    for r in refs {
        grouped.entry(r.owner_id).or_default().push(r);
    }
    Ok(grouped)
}

/// Delete the stored file and its `blob_object` row if no reference
/// points at `hash`. Holds the row lock for the check and the delete, and
/// removes the file only when this call removed the row.
async fn release_locked<C: ConnectionTrait>(
    txn: &C,
    store: &dyn FileStore,
    hash: &str,
) -> Result<bool, AppError> {
    let locked = blob_object::Entity::find_by_id(hash.to_string())
        .lock(LockType::Update)
        .one(txn)
        .await?;
    if locked.is_none() {
        return Ok(false);
    }
    let still_used = blob_ref::Entity::find()
        .filter(blob_ref::Column::ContentHash.eq(hash))
        .one(txn)
        .await?
        .is_some();
    if still_used {
        return Ok(false);
    }
    let removed = blob_object::Entity::delete_by_id(hash.to_string())
        .exec(txn)
        .await?
        .rows_affected;
    if removed == 0 {
        return Ok(false);
    }
    Ok(store.delete(&ContentHash::from_hex(hash)?).await?)
}

fn log_release(hash: &str, result: Result<bool, AppError>) {
    match result {
        Ok(true) => tracing::debug!(%hash, "Removed unreferenced file"),
        Ok(false) => {}
        Err(e) => tracing::warn!(%hash, error = ?e, "Failed to clean up unreferenced file"),
    }
}

/// Remove the file behind `hash` once nothing references it any more.
/// Failures are logged, not returned: the owning change has already been
/// committed.
pub async fn release_if_orphaned<C: TransactionTrait>(db: &C, store: &dyn FileStore, hash: &str) {
    let result = async {
        let txn = db.begin().await?;
        let released = release_locked(&txn, store, hash).await?;
        txn.commit().await?;
        Ok::<_, AppError>(released)
    }
    .await;
    log_release(hash, result);
}

/// Clean up files uploaded during a request that failed before they were
/// attached to anything. The row is registered first so a concurrent
/// [`attach`] of the same content is waited for, not raced.
pub async fn discard_parts<C: TransactionTrait>(
    db: &C,
    store: &dyn FileStore,
    parts: impl IntoIterator<Item = &UploadedPart>,
) {
    for part in parts {
        let hash = part.stored.hash.to_hex();
        let result = async {
            let txn = db.begin().await?;
            lock_blob_object(&txn, &part.stored).await?;
            let released = release_locked(&txn, store, &hash).await?;
            txn.commit().await?;
            Ok::<_, AppError>(released)
        }
        .await;
        log_release(&hash, result);
    }
}

/// Stream a referenced file back to the client, honouring `If-None-Match`.
pub async fn file_response(
    file: &blob_ref::Model,
    headers: &HeaderMap,
    store: &dyn FileStore,
) -> Result<Response, AppError> {
    let etag_value = format!("\"{}\"", file.content_hash);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let hash = ContentHash::from_hex(&file.content_hash)?;
    let reader = store.get_stream(&hash).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let content_type = file
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&file.filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// `Content-Disposition` with an ASCII fallback and an RFC 5987
/// `filename*` for the original name.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                String::from(b as char)
            }
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
