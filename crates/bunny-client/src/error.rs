//! Bunny API error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for Bunny API operations.
pub type BunnyResult<T> = Result<T, BunnyError>;

/// Errors that can occur while talking to Bunny.net.
#[derive(Debug, Error)]
pub enum BunnyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid HTTP method provided: {0}")]
    InvalidMethod(String),

    #[error("Library ID is required to {0}")]
    MissingLibraryId(&'static str),

    #[error("Collection ID is required")]
    MissingCollectionId,

    #[error("Video ID is required")]
    MissingVideoId,

    #[error("Collection name is required")]
    MissingCollectionName,

    #[error("Library name is required")]
    MissingLibraryName,

    #[error("Invalid storage zone ID")]
    InvalidStorageZoneId,

    #[error("Account user data is empty")]
    EmptyUser,

    #[error("No changes detected for the collection update")]
    NoUpdateData,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Bunny.net API Error (HTTP {0}): {1}")]
    ServerError(u16, String),

    #[error("Bunny.net API Error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bunny.net API failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<BunnyError>,
    },
}

impl BunnyError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(
        status: u16,
        body: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let body = body.into();
        match status {
            401 => Self::Unauthorized(body),
            404 => Self::NotFound(body),
            409 => Self::Conflict(body),
            429 => Self::RateLimited {
                message: body,
                retry_after,
            },
            500..=599 => Self::ServerError(status, body),
            _ => Self::Http { status, body },
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            BunnyError::ConfigError(_) => "config_error",
            BunnyError::InvalidMethod(_) => "invalid_http_method",
            BunnyError::MissingLibraryId(_) => "missing_library_id",
            BunnyError::MissingCollectionId => "missing_collection_id",
            BunnyError::MissingVideoId => "missing_video_id",
            BunnyError::MissingCollectionName => "missing_collection_name",
            BunnyError::MissingLibraryName => "missing_library_name",
            BunnyError::InvalidStorageZoneId => "invalid_storage_zone_id",
            BunnyError::EmptyUser => "empty_user",
            BunnyError::NoUpdateData => "no_update_data",
            BunnyError::Unauthorized(_) => "unauthorized",
            BunnyError::NotFound(_) => "not_found",
            BunnyError::RateLimited { .. } => "rate_limited",
            BunnyError::Conflict(_) | BunnyError::ServerError(..) | BunnyError::Http { .. } => {
                "bunny_api_http_error"
            }
            BunnyError::InvalidResponse(_) | BunnyError::Json(_) => "invalid_response",
            BunnyError::Network(_) => "network_error",
            BunnyError::Io(_) => "io_error",
            BunnyError::RetriesExhausted { .. } => "api_failure",
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            BunnyError::Network(e) => !e.is_decode() && !e.is_builder(),
            BunnyError::RateLimited { .. } | BunnyError::ServerError(..) => true,
            _ => false,
        }
    }

    /// HTTP status associated with the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            BunnyError::Unauthorized(_) => Some(401),
            BunnyError::NotFound(_) => Some(404),
            BunnyError::Conflict(_) => Some(409),
            BunnyError::RateLimited { .. } => Some(429),
            BunnyError::ServerError(status, _) => Some(*status),
            BunnyError::Http { status, .. } => Some(*status),
            BunnyError::Network(e) => e.status().map(|s| s.as_u16()),
            BunnyError::RetriesExhausted { last, .. } => last.http_status(),
            _ => None,
        }
    }

    /// Server-provided delay before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BunnyError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BunnyError::NotFound(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, BunnyError::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_without_retry_after() {
        let err = BunnyError::from_http_status(429, "slow down", None);
        assert!(err.is_rate_limited());
        assert!(err.is_retryable());
        assert!(err.retry_after().is_none());
        assert!(!BunnyError::from_http_status(503, "down", None).is_rate_limited());
    }

    #[test]
    fn test_storage_zone_codes() {
        assert_eq!(BunnyError::InvalidStorageZoneId.code(), "invalid_storage_zone_id");
        assert_eq!(BunnyError::EmptyUser.code(), "empty_user");
    }
}
