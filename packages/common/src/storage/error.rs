/// Errors that can occur while storing or reading uploaded files.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No file with the given content hash is stored.
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The provided content hash is not 64 hex characters.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// The upload is larger than the limit the caller allows for it.
    #[error("file exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },
}
