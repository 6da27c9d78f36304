//! Storage error types and the path provider seam

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Staging failed: {0}")]
    StagingFailed(String),

    #[error("Invalid filename: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where uploads live on disk and where they are served from.
///
/// The avatar store appends `{avatars_dir}/{user_id}` to both.
pub trait StoragePathProvider: Send + Sync {
    fn uploads_base_dir(&self) -> PathBuf;

    /// Public base URL, without a trailing slash.
    fn uploads_base_url(&self) -> String;
}
