//! Video status and per-post metadata models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CollectionId, VideoId};

/// Encoding status reported by Bunny Stream.
///
/// Serialized as the integer code the API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "i32", into = "i32")]
pub enum VideoStatus {
    /// Video object exists but no file has been uploaded
    #[default]
    Created,
    /// File received, waiting for processing
    Uploaded,
    Processing,
    Transcoding,
    /// Encoding finished, playable
    Finished,
    Error,
    UploadFailed,
    JitSegmenting,
    JitPlaylistsCreated,
    /// Code not known to this client
    Unknown(i32),
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Created => "created",
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Processing => "processing",
            VideoStatus::Transcoding => "transcoding",
            VideoStatus::Finished => "finished",
            VideoStatus::Error => "error",
            VideoStatus::UploadFailed => "upload_failed",
            VideoStatus::JitSegmenting => "jit_segmenting",
            VideoStatus::JitPlaylistsCreated => "jit_playlists_created",
            VideoStatus::Unknown(_) => "unknown",
        }
    }

    /// True once the video can be played back.
    pub fn is_ready(&self) -> bool {
        matches!(self, VideoStatus::Finished | VideoStatus::JitPlaylistsCreated)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, VideoStatus::Error | VideoStatus::UploadFailed)
    }
}

impl From<i32> for VideoStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => VideoStatus::Created,
            1 => VideoStatus::Uploaded,
            2 => VideoStatus::Processing,
            3 => VideoStatus::Transcoding,
            4 => VideoStatus::Finished,
            5 => VideoStatus::Error,
            6 => VideoStatus::UploadFailed,
            7 => VideoStatus::JitSegmenting,
            8 => VideoStatus::JitPlaylistsCreated,
            other => VideoStatus::Unknown(other),
        }
    }
}

impl From<VideoStatus> for i32 {
    fn from(status: VideoStatus) -> Self {
        match status {
            VideoStatus::Created => 0,
            VideoStatus::Uploaded => 1,
            VideoStatus::Processing => 2,
            VideoStatus::Transcoding => 3,
            VideoStatus::Finished => 4,
            VideoStatus::Error => 5,
            VideoStatus::UploadFailed => 6,
            VideoStatus::JitSegmenting => 7,
            VideoStatus::JitPlaylistsCreated => 8,
            VideoStatus::Unknown(code) => code,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a post plays its offloaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Direct MP4 rendition served from the pull zone
    #[default]
    Mp4,
    /// Bunny's hosted iframe player
    Iframe,
}

impl PlaybackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackMode::Mp4 => "mp4",
            PlaybackMode::Iframe => "iframe",
        }
    }
}

/// Video metadata stored against a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Remote video GUID
    pub video_id: VideoId,

    /// Collection the video was filed under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<CollectionId>,

    /// Direct MP4 playback URL
    pub video_url: String,

    /// Embeddable player URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iframe_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    #[serde(default)]
    pub playback_mode: PlaybackMode,

    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

impl VideoMetadata {
    /// Playback URLs for this record.
    pub fn playback_urls(&self) -> PlaybackUrls {
        PlaybackUrls {
            mp4: self.video_url.clone(),
            iframe: self.iframe_url.clone(),
        }
    }
}

/// Playback URLs resolved for a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackUrls {
    pub mp4: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iframe: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(VideoStatus::from(4), VideoStatus::Finished);
        assert_eq!(VideoStatus::from(42), VideoStatus::Unknown(42));
        assert_eq!(i32::from(VideoStatus::UploadFailed), 6);
    }

    #[test]
    fn test_status_serde_as_integer() {
        let status: VideoStatus = serde_json::from_str("3").unwrap();
        assert_eq!(status, VideoStatus::Transcoding);
        assert_eq!(serde_json::to_string(&VideoStatus::Finished).unwrap(), "4");
    }

    #[test]
    fn test_status_predicates() {
        assert!(VideoStatus::Finished.is_ready());
        assert!(!VideoStatus::Transcoding.is_ready());
        assert!(VideoStatus::Error.is_failed());
    }

    #[test]
    fn test_metadata_roundtrip_omits_empty_fields() {
        let meta = VideoMetadata {
            video_id: VideoId::from("v-1"),
            collection_id: None,
            video_url: "https://zone.b-cdn.net/v-1/play_720p.mp4".to_string(),
            iframe_url: None,
            thumbnail_url: None,
            playback_mode: PlaybackMode::Mp4,
            uploaded_at: Utc::now(),
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("collection_id").is_none());
        assert_eq!(json["playback_mode"], "mp4");

        let back: VideoMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
