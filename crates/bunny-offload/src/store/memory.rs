//! In-process store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use bunny_models::{CollectionId, PostId, UserId, VideoMetadata};

use super::{LockStore, LockToken, MetadataStore};
use crate::error::OffloadResult;

/// Store backed by process memory. State is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<UserId, CollectionId>>,
    videos: RwLock<HashMap<PostId, VideoMetadata>>,
    thumbnails: RwLock<HashMap<PostId, String>>,
    locks: Mutex<HashMap<String, (LockToken, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn user_collection(&self, user: UserId) -> OffloadResult<Option<CollectionId>> {
        Ok(self.collections.read().await.get(&user).cloned())
    }

    async fn set_user_collection(&self, user: UserId, collection: &CollectionId) -> OffloadResult<()> {
        self.collections.write().await.insert(user, collection.clone());
        Ok(())
    }

    async fn delete_user_collection(&self, user: UserId) -> OffloadResult<()> {
        self.collections.write().await.remove(&user);
        Ok(())
    }

    async fn post_video(&self, post: PostId) -> OffloadResult<Option<VideoMetadata>> {
        Ok(self.videos.read().await.get(&post).cloned())
    }

    async fn set_post_video(&self, post: PostId, metadata: &VideoMetadata) -> OffloadResult<()> {
        self.videos.write().await.insert(post, metadata.clone());
        Ok(())
    }

    async fn delete_post_video(&self, post: PostId) -> OffloadResult<()> {
        self.videos.write().await.remove(&post);
        Ok(())
    }

    async fn post_thumbnail(&self, post: PostId) -> OffloadResult<Option<String>> {
        Ok(self.thumbnails.read().await.get(&post).cloned())
    }

    async fn set_post_thumbnail(&self, post: PostId, url: &str) -> OffloadResult<()> {
        self.thumbnails.write().await.insert(post, url.to_string());
        Ok(())
    }

    async fn delete_post_thumbnail(&self, post: PostId) -> OffloadResult<()> {
        self.thumbnails.write().await.remove(&post);
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> OffloadResult<Option<LockToken>> {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        if let Some((_, expires_at)) = locks.get(key) {
            if *expires_at > now {
                return Ok(None);
            }
        }

        let token = LockToken::generate();
        locks.insert(key.to_string(), (token.clone(), now + ttl));
        Ok(Some(token))
    }

    async fn release(&self, key: &str, token: &LockToken) -> OffloadResult<()> {
        let mut locks = self.locks.lock().await;
        if locks.get(key).is_some_and(|(held, _)| held == token) {
            locks.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_collection_mapping() {
        let store = MemoryStore::new();
        assert!(store.user_collection(UserId(1)).await.unwrap().is_none());

        store
            .set_user_collection(UserId(1), &CollectionId::from("c-1"))
            .await
            .unwrap();
        assert_eq!(
            store.user_collection(UserId(1)).await.unwrap(),
            Some(CollectionId::from("c-1"))
        );

        store.delete_user_collection(UserId(1)).await.unwrap();
        assert!(store.user_collection(UserId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_video_overwrite() {
        let store = MemoryStore::new();
        let mut meta = VideoMetadata {
            video_id: "v-1".into(),
            collection_id: None,
            video_url: "https://zone/v-1/play_720p.mp4".into(),
            iframe_url: None,
            thumbnail_url: None,
            playback_mode: Default::default(),
            uploaded_at: Utc::now(),
        };
        store.set_post_video(PostId(9), &meta).await.unwrap();

        meta.video_id = "v-2".into();
        store.set_post_video(PostId(9), &meta).await.unwrap();

        let stored = store.post_video(PostId(9)).await.unwrap().unwrap();
        assert_eq!(stored.video_id.as_str(), "v-2");
    }

    #[tokio::test]
    async fn test_thumbnail_without_video_metadata() {
        let store = MemoryStore::new();
        let url = "https://zone.b-cdn.net/v-1/thumbnail.jpg";

        assert_ok!(store.set_post_thumbnail(PostId(3), url).await);
        assert_eq!(store.post_thumbnail(PostId(3)).await.unwrap().as_deref(), Some(url));
        assert!(store.post_video(PostId(3)).await.unwrap().is_none());

        assert_ok!(store.delete_post_thumbnail(PostId(3)).await);
        assert!(store.post_thumbnail(PostId(3)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_is_exclusive_until_expiry() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(10);

        let token = store.try_acquire("k", ttl).await.unwrap();
        assert!(token.is_some());
        assert!(store.try_acquire("k", ttl).await.unwrap().is_none());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.try_acquire("k", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_requires_matching_token() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(10);

        let token = store.try_acquire("k", ttl).await.unwrap().unwrap();
        assert_ok!(store.release("k", &LockToken::generate()).await);
        assert!(store.try_acquire("k", ttl).await.unwrap().is_none());

        assert_ok!(store.release("k", &token).await);
        assert!(store.try_acquire("k", ttl).await.unwrap().is_some());
    }
}
