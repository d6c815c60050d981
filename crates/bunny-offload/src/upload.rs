//! Video upload flow and per-post playback bookkeeping.
//!
//! An upload validates the local file, resolves the target collection,
//! creates the remote video object, PUTs the body and records the playback
//! URLs against the post.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, Instrument};

use bunny_client::{BunnyClient, BunnyError, DeleteOutcome};
use bunny_models::{
    iframe_embed_url, playback_mp4_url, thumbnail_url, CollectionId, PlaybackMode, PlaybackUrls,
    PostId, UserId, VideoId, VideoMetadata,
};

use crate::collections::CollectionManager;
use crate::config::{OffloadConfig, UploadMode};
use crate::error::{OffloadError, OffloadResult};
use crate::logging::OperationLogger;
use crate::store::{MetadataStore, Stores};

/// Bytes read from the head of a file to identify its container.
const SNIFF_LEN: usize = 64;

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Identify the container from its leading bytes.
///
/// Accepts MP4 (an `ftyp` box first) and WebM (EBML header).
pub fn sniff_video_mime(header: &[u8]) -> Option<&'static str> {
    if header.len() >= 8 && &header[4..8] == b"ftyp" {
        Some("video/mp4")
    } else if header.starts_with(&EBML_MAGIC) {
        Some("video/webm")
    } else {
        None
    }
}

/// One upload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub path: PathBuf,
    /// Owner; when set, the owner's collection is used
    pub user_id: Option<UserId>,
    /// Explicit collection, used when no user is given
    pub collection_id: Option<CollectionId>,
    /// Post to record the playback URLs against
    pub post_id: Option<PostId>,
    /// Remote title; defaults to the file name
    pub title: Option<String>,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    fn resolved_title(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "video".to_string())
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub video_id: VideoId,
    pub collection_id: CollectionId,
    pub video_url: String,
    pub iframe_url: String,
    pub mime: &'static str,
    pub size: u64,
}

/// Result of a thumbnail update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailOutcome {
    pub video_id: VideoId,
    pub thumbnail_url: String,
    /// Frame time applied remotely, if one was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

/// Offload operations over a Bunny client and a metadata store.
#[derive(Clone)]
pub struct OffloadService {
    client: BunnyClient,
    collections: CollectionManager,
    metadata: Arc<dyn MetadataStore>,
    config: Arc<OffloadConfig>,
}

impl OffloadService {
    pub fn new(config: OffloadConfig, stores: Stores) -> OffloadResult<Self> {
        let client = BunnyClient::new(config.bunny.clone())?;
        let collections = CollectionManager::new(client.clone(), &stores, &config);
        Ok(Self {
            client,
            collections,
            metadata: stores.metadata,
            config: Arc::new(config),
        })
    }

    /// Build from environment, picking the store backend from `REDIS_URL`.
    pub fn from_env() -> OffloadResult<Self> {
        let config = OffloadConfig::from_env()?;
        let stores = Stores::from_url(config.redis_url.as_deref())?;
        Self::new(config, stores)
    }

    pub fn client(&self) -> &BunnyClient {
        &self.client
    }

    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    /// Upload a local video file.
    pub async fn upload_video(&self, request: &UploadRequest) -> OffloadResult<UploadOutcome> {
        let logger = OperationLogger::new("upload_video", request.path.display().to_string());
        let span = logger.create_span();

        async {
            logger.log_start("validating file");
            let result = self.upload_inner(request, &logger).await;
            match &result {
                Ok(outcome) => logger.log_completion(&format!("video {}", outcome.video_id)),
                Err(e) => logger.log_error(&e.to_string()),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn upload_inner(
        &self,
        request: &UploadRequest,
        logger: &OperationLogger,
    ) -> OffloadResult<UploadOutcome> {
        let library_id = self.client.library_id().ok_or(OffloadError::MissingLibraryId)?;
        let (size, mime) = self.validate_file(&request.path).await?;

        let collection_id = match request.user_id {
            Some(user) => self.collections.ensure_user_collection(user).await?,
            None => request
                .collection_id
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or(OffloadError::Bunny(BunnyError::MissingCollectionId))?,
        };

        let title = request.resolved_title();
        let video = self
            .client
            .create_video(&title, &collection_id)
            .await
            .map_err(OffloadError::VideoCreationFailed)?;
        logger.log_progress(&format!("created video object {}", video.guid));

        if let Err(e) = self.put_body(&video.guid, &request.path).await {
            self.discard_orphan(&video.guid, logger).await;
            return Err(e);
        }
        logger.log_progress("body uploaded");

        let video_url = playback_mp4_url(self.config.pull_zone().unwrap_or_default(), &video.guid);
        let iframe_url = iframe_embed_url(library_id, &video.guid);

        if let Some(post) = request.post_id {
            let metadata = VideoMetadata {
                video_id: video.guid.clone(),
                collection_id: Some(collection_id.clone()),
                video_url: video_url.clone(),
                iframe_url: Some(iframe_url.clone()),
                thumbnail_url: None,
                playback_mode: PlaybackMode::Mp4,
                uploaded_at: Utc::now(),
            };
            self.metadata.set_post_video(post, &metadata).await?;
            // A thumbnail chosen for an earlier video no longer applies
            self.metadata.delete_post_thumbnail(post).await?;
        }

        Ok(UploadOutcome {
            video_id: video.guid,
            collection_id,
            video_url,
            iframe_url,
            mime,
            size,
        })
    }

    async fn validate_file(&self, path: &Path) -> OffloadResult<(u64, &'static str)> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| OffloadError::InvalidFilePath(format!("{}: {}", path.display(), e)))?;
        if !meta.is_file() {
            return Err(OffloadError::InvalidFilePath(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let size = meta.len();
        if size > self.config.max_file_size {
            return Err(OffloadError::FileTooLarge {
                size,
                max: self.config.max_file_size,
            });
        }
        if size == 0 {
            return Err(OffloadError::FileReadFailed(format!(
                "{} is empty",
                path.display()
            )));
        }

        let mut header = Vec::with_capacity(SNIFF_LEN);
        tokio::fs::File::open(path)
            .await
            .map_err(|e| OffloadError::FileReadFailed(e.to_string()))?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut header)
            .await
            .map_err(|e| OffloadError::FileReadFailed(e.to_string()))?;

        let mime = sniff_video_mime(&header).ok_or_else(|| {
            OffloadError::InvalidMime(format!("{} is not MP4 or WebM", path.display()))
        })?;

        debug!(path = %path.display(), size = size, mime = mime, "File validated");
        Ok((size, mime))
    }

    async fn put_body(&self, video_id: &VideoId, path: &Path) -> OffloadResult<()> {
        let result = match self.config.upload_mode {
            UploadMode::Memory => {
                let data = tokio::fs::read(path)
                    .await
                    .map_err(|e| OffloadError::FileReadFailed(e.to_string()))?;
                self.client.upload_video_bytes(video_id, Bytes::from(data)).await
            }
            UploadMode::Stream => self.client.upload_video_file(video_id, path).await,
        };

        result.map(|_| ()).map_err(OffloadError::VideoUploadFailed)
    }

    /// Best-effort removal of a video object whose body never arrived.
    async fn discard_orphan(&self, video_id: &VideoId, logger: &OperationLogger) {
        if let Err(e) = self.client.delete_video(video_id).await {
            logger.log_warning(&format!("could not remove empty video {}: {}", video_id, e));
        }
    }

    /// Set the thumbnail of a video and record its URL on the post.
    ///
    /// The URL is stored for the post even when the post has no video
    /// metadata in this store.
    pub async fn set_thumbnail(
        &self,
        video_id: &VideoId,
        time: Option<u64>,
        post: Option<PostId>,
    ) -> OffloadResult<ThumbnailOutcome> {
        let pull_zone = self.config.pull_zone().ok_or(OffloadError::MissingPullZone)?;
        let url = thumbnail_url(pull_zone, video_id);

        if let Some(seconds) = time {
            self.client.set_thumbnail_time(video_id, seconds).await?;
        }

        if let Some(post) = post {
            self.metadata.set_post_thumbnail(post, &url).await?;
            if let Some(mut metadata) = self.metadata.post_video(post).await? {
                metadata.thumbnail_url = Some(url.clone());
                self.metadata.set_post_video(post, &metadata).await?;
            }
            debug!(post_id = %post, thumbnail_url = %url, "Recorded post thumbnail");
        }

        Ok(ThumbnailOutcome {
            video_id: video_id.clone(),
            thumbnail_url: url,
            time,
        })
    }

    /// Stored playback URLs for a post.
    pub async fn playback_urls(&self, post: PostId) -> OffloadResult<Option<PlaybackUrls>> {
        Ok(self
            .metadata
            .post_video(post)
            .await?
            .map(|m| m.playback_urls()))
    }

    /// Playback URL for an attachment, or `fallback` when it was not offloaded.
    pub async fn resolve_attachment_url(&self, post: PostId, fallback: &str) -> OffloadResult<String> {
        Ok(self
            .metadata
            .post_video(post)
            .await?
            .map(|m| m.video_url)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| fallback.to_string()))
    }

    /// Thumbnail URL for a post, or `fallback` when none was recorded.
    pub async fn resolve_thumbnail_url(&self, post: PostId, fallback: &str) -> OffloadResult<String> {
        if let Some(url) = self.metadata.post_thumbnail(post).await?.filter(|u| !u.is_empty()) {
            return Ok(url);
        }
        Ok(self
            .metadata
            .post_video(post)
            .await?
            .and_then(|m| m.thumbnail_url)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| fallback.to_string()))
    }

    /// Delete the post's remote video and forget its metadata.
    ///
    /// Returns `None` when the post has no offloaded video. The post's
    /// thumbnail record is dropped either way.
    pub async fn delete_post_video(&self, post: PostId) -> OffloadResult<Option<DeleteOutcome>> {
        let Some(metadata) = self.metadata.post_video(post).await? else {
            self.metadata.delete_post_thumbnail(post).await?;
            return Ok(None);
        };

        let logger = OperationLogger::new("delete_post_video", post.to_string());
        let outcome = self.client.delete_video(&metadata.video_id).await?;
        self.metadata.delete_post_video(post).await?;
        self.metadata.delete_post_thumbnail(post).await?;
        logger.log_completion(&format!("video {} {:?}", metadata.video_id, outcome));

        Ok(Some(outcome))
    }

    /// Remove a user's collection and its mapping.
    pub async fn delete_user(&self, user: UserId) -> OffloadResult<Option<DeleteOutcome>> {
        self.collections.delete_user_collection(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_mp4() {
        let header = [0, 0, 0, 0x20, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm'];
        assert_eq!(sniff_video_mime(&header), Some("video/mp4"));
    }

    #[test]
    fn test_sniff_webm() {
        let header = [0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x86, 0x81];
        assert_eq!(sniff_video_mime(&header), Some("video/webm"));
    }

    #[test]
    fn test_sniff_rejects_other() {
        assert_eq!(sniff_video_mime(b"\x89PNG\r\n\x1a\n"), None);
        assert_eq!(sniff_video_mime(b"ftyp"), None);
        assert_eq!(sniff_video_mime(&[]), None);
    }

    #[test]
    fn test_title_defaults_to_file_name() {
        let mut request = UploadRequest::new("/tmp/uploads/holiday.mp4");
        assert_eq!(request.resolved_title(), "holiday.mp4");

        request.title = Some("  ".into());
        assert_eq!(request.resolved_title(), "holiday.mp4");

        request.title = Some("Holiday".into());
        assert_eq!(request.resolved_title(), "Holiday");
    }
}
