//! Key-value persistence for offload state.
//!
//! Flat records are kept for the remote collection id of each user, the video
//! metadata of each post and the thumbnail URL chosen for each post. Advisory locks live next to them so that
//! collection creation is single-flight across processes sharing a backend.

mod memory;
mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bunny_models::{CollectionId, PostId, UserId, VideoMetadata};

use crate::error::OffloadResult;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Opaque proof of lock ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    /// Fresh random token.
    pub fn generate() -> Self {
        Self(format!("offload:{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-user and per-post metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn user_collection(&self, user: UserId) -> OffloadResult<Option<CollectionId>>;

    async fn set_user_collection(&self, user: UserId, collection: &CollectionId) -> OffloadResult<()>;

    async fn delete_user_collection(&self, user: UserId) -> OffloadResult<()>;

    async fn post_video(&self, post: PostId) -> OffloadResult<Option<VideoMetadata>>;

    async fn set_post_video(&self, post: PostId, metadata: &VideoMetadata) -> OffloadResult<()>;

    async fn delete_post_video(&self, post: PostId) -> OffloadResult<()>;

    /// Thumbnail URL recorded for a post, independent of its video metadata.
    async fn post_thumbnail(&self, post: PostId) -> OffloadResult<Option<String>>;

    async fn set_post_thumbnail(&self, post: PostId, url: &str) -> OffloadResult<()>;

    async fn delete_post_thumbnail(&self, post: PostId) -> OffloadResult<()>;
}

/// Short-lived advisory locks.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Take the lock unless someone else holds it. `None` when held.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> OffloadResult<Option<LockToken>>;

    /// Release a lock. A token that no longer owns the key is ignored.
    async fn release(&self, key: &str, token: &LockToken) -> OffloadResult<()>;
}

/// Store handles shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub metadata: Arc<dyn MetadataStore>,
    pub locks: Arc<dyn LockStore>,
}

impl Stores {
    /// Both roles served by one in-process store.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            metadata: store.clone(),
            locks: store,
        }
    }

    /// Both roles served by Redis.
    pub fn redis(url: &str) -> OffloadResult<Self> {
        let store = Arc::new(RedisStore::new(url)?);
        Ok(Self {
            metadata: store.clone(),
            locks: store,
        })
    }

    /// Redis when a URL is configured, memory otherwise.
    pub fn from_url(redis_url: Option<&str>) -> OffloadResult<Self> {
        match redis_url {
            Some(url) => Self::redis(url),
            None => Ok(Self::in_memory()),
        }
    }
}
