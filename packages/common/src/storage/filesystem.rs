use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::hash::ContentHash;
use super::traits::{BoxReader, FileStore, StoredFile};

/// Stores files under `{base}/{2 hex chars}/{62 hex chars}`.
///
/// Writes go to `{base}/.tmp` first and are renamed into place, so a
/// reader never observes a partially written file.
pub struct FilesystemFileStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemFileStore {
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn file_path(&self, hash: &ContentHash) -> PathBuf {
        self.base_path
            .join(hash.shard_prefix())
            .join(hash.shard_suffix())
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    fn effective_limit(&self, limit: Option<u64>) -> u64 {
        limit.map_or(self.max_size, |l| l.min(self.max_size))
    }
}

#[async_trait]
impl FileStore for FilesystemFileStore {
    async fn put_stream(
        &self,
        mut reader: BoxReader,
        limit: Option<u64>,
    ) -> Result<StoredFile, StorageError> {
        let limit = self.effective_limit(limit);
        let temp_path = self.temp_path();
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];
        let mut temp_file = fs::File::create(&temp_path).await?;

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    drop(temp_file);
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            total += n as u64;
            if total > limit {
                drop(temp_file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(StorageError::SizeLimitExceeded {
                    actual: total,
                    limit,
                });
            }
            hasher.update(&buf[..n]);
            temp_file.write_all(&buf[..n]).await?;
        }
        temp_file.flush().await?;
        drop(temp_file);

        let hash = ContentHash::from_bytes(hasher.finalize().into());
        let target = self.file_path(&hash);

        if fs::try_exists(&target).await? {
            let _ = fs::remove_file(&temp_path).await;
            return Ok(StoredFile { hash, size: total });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Err(e) = fs::rename(&temp_path, &target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(StoredFile { hash, size: total })
    }

    async fn get_stream(&self, hash: &ContentHash) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.file_path(hash)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(hash.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.file_path(hash)).await?)
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        match fs::remove_file(self.file_path(hash)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
