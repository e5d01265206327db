use thiserror::Error;

/// Failures of a [`BlobStore`](crate::BlobStore) operation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The name is not a safe flat filename.
    #[error("invalid blob name: {0}")]
    InvalidName(String),

    #[error("blob exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    /// Names are never reused; a second write under one name is refused.
    #[error("blob already exists: {0}")]
    AlreadyExists(String),
}
