use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::hash::ContentHash;

pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredFile {
    pub hash: ContentHash,
    pub size: u64,
}

/// Content-addressed file storage.
///
/// Identical uploads share one stored copy; callers keep their own
/// references and decide when a copy is no longer needed.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store an in-memory buffer, honouring the store-wide size limit.
    async fn put(&self, data: &[u8]) -> Result<StoredFile, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(reader, None).await
    }

    /// Stream data into the store. `limit` tightens the store-wide limit
    /// for this call (compos carry their own per-file maximums).
    async fn put_stream(
        &self,
        reader: BoxReader,
        limit: Option<u64>,
    ) -> Result<StoredFile, StorageError>;

    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(hash).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn get_stream(&self, hash: &ContentHash) -> Result<BoxReader, StorageError>;

    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// Returns `false` when nothing was stored under `hash`.
    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError>;
}
