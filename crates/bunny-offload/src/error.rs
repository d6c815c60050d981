//! Offload error types.

use bunny_client::BunnyError;
use bunny_models::UserId;
use thiserror::Error;

pub type OffloadResult<T> = Result<T, OffloadError>;

#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Library ID is not configured")]
    MissingLibraryId,

    #[error("Pull zone is not configured")]
    MissingPullZone,

    #[error("Invalid file path: {0}")]
    InvalidFilePath(String),

    #[error("File is {size} bytes, larger than the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported video format: {0}")]
    InvalidMime(String),

    #[error("Failed to read video file: {0}")]
    FileReadFailed(String),

    #[error("Collection creation for user {0} is already in progress")]
    CollectionLocked(UserId),

    #[error("Failed to create collection for user {user}: {source}")]
    CollectionCreationFailed {
        user: UserId,
        #[source]
        source: BunnyError,
    },

    #[error("Failed to create video object: {0}")]
    VideoCreationFailed(#[source] BunnyError),

    #[error("Failed to upload video: {0}")]
    VideoUploadFailed(#[source] BunnyError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Bunny error: {0}")]
    Bunny(#[from] BunnyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OffloadError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            OffloadError::ConfigError(_) => "config_error",
            OffloadError::MissingLibraryId => "missing_library_id",
            OffloadError::MissingPullZone => "missing_pull_zone",
            OffloadError::InvalidFilePath(_) => "invalid_file_path",
            OffloadError::FileTooLarge { .. } => "file_too_large",
            OffloadError::InvalidMime(_) => "invalid_mime",
            OffloadError::FileReadFailed(_) | OffloadError::Io(_) => "video_file_read_failed",
            OffloadError::CollectionLocked(_) => "collection_creation_locked",
            OffloadError::CollectionCreationFailed { .. } => "collection_creation_failed",
            OffloadError::VideoCreationFailed(_) => "video_creation_failed",
            OffloadError::VideoUploadFailed(_) => "video_upload_failed",
            OffloadError::Store(_) => "store_error",
            OffloadError::Bunny(e) => e.code(),
        }
    }
}

impl From<redis::RedisError> for OffloadError {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for OffloadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(format!("corrupt stored record: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(OffloadError::CollectionLocked(UserId(3)).code(), "collection_creation_locked");
        assert_eq!(
            OffloadError::FileTooLarge { size: 2, max: 1 }.code(),
            "file_too_large"
        );
        assert_eq!(
            OffloadError::VideoUploadFailed(BunnyError::MissingVideoId).code(),
            "video_upload_failed"
        );
    }

    #[test]
    fn test_bunny_codes_pass_through() {
        let err: OffloadError = BunnyError::InvalidMethod("PATCH".into()).into();
        assert_eq!(err.code(), "invalid_http_method");
    }
}
