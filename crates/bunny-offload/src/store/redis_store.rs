//! Redis-backed store.
//!
//! Locks use `SET key token NX EX ttl` and are released with a
//! compare-and-delete script so a holder whose lock expired cannot delete a
//! lock someone else has since taken.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::debug;

use bunny_models::{CollectionId, PostId, UserId, VideoMetadata};

use super::{LockStore, LockToken, MetadataStore};
use crate::error::OffloadResult;

const KEY_PREFIX: &str = "bunny_offload";

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

fn user_collection_key(user: UserId) -> String {
    format!("{}:user:{}:collection_id", KEY_PREFIX, user)
}

fn post_video_key(post: PostId) -> String {
    format!("{}:post:{}:video", KEY_PREFIX, post)
}

fn post_thumbnail_key(post: PostId) -> String {
    format!("{}:post:{}:thumbnail_url", KEY_PREFIX, post)
}

fn lock_key(key: &str) -> String {
    format!("{}:lock:{}", KEY_PREFIX, key)
}

/// Store backed by Redis.
pub struct RedisStore {
    redis: redis::Client,
}

impl RedisStore {
    /// Create a store. No connection is made until first use.
    pub fn new(url: &str) -> OffloadResult<Self> {
        Ok(Self {
            redis: redis::Client::open(url)?,
        })
    }

    async fn conn(&self) -> OffloadResult<MultiplexedConnection> {
        Ok(self.redis.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl MetadataStore for RedisStore {
    async fn user_collection(&self, user: UserId) -> OffloadResult<Option<CollectionId>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(user_collection_key(user)).await?;
        Ok(raw.map(CollectionId::from_string).filter(|c| !c.is_empty()))
    }

    async fn set_user_collection(&self, user: UserId, collection: &CollectionId) -> OffloadResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .set(user_collection_key(user), collection.as_str())
            .await?;
        Ok(())
    }

    async fn delete_user_collection(&self, user: UserId) -> OffloadResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.del(user_collection_key(user)).await?;
        Ok(())
    }

    async fn post_video(&self, post: PostId) -> OffloadResult<Option<VideoMetadata>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(post_video_key(post)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_post_video(&self, post: PostId, metadata: &VideoMetadata) -> OffloadResult<()> {
        let json = serde_json::to_string(metadata)?;
        let mut conn = self.conn().await?;
        let _: () = conn.set(post_video_key(post), json).await?;
        Ok(())
    }

    async fn delete_post_video(&self, post: PostId) -> OffloadResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.del(post_video_key(post)).await?;
        Ok(())
    }

    async fn post_thumbnail(&self, post: PostId) -> OffloadResult<Option<String>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(post_thumbnail_key(post)).await?;
        Ok(raw.filter(|url| !url.is_empty()))
    }

    async fn set_post_thumbnail(&self, post: PostId, url: &str) -> OffloadResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set(post_thumbnail_key(post), url).await?;
        Ok(())
    }

    async fn delete_post_thumbnail(&self, post: PostId) -> OffloadResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.del(post_thumbnail_key(post)).await?;
        Ok(())
    }
}

#[async_trait]
impl LockStore for RedisStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> OffloadResult<Option<LockToken>> {
        let mut conn = self.conn().await?;
        let token = LockToken::generate();

        // SET key value NX EX ttl
        let result: Option<String> = redis::cmd("SET")
            .arg(lock_key(key))
            .arg(token.as_str())
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(result.map(|_| token))
    }

    async fn release(&self, key: &str, token: &LockToken) -> OffloadResult<()> {
        let mut conn = self.conn().await?;
        let key = lock_key(key);

        let deleted: i32 = Script::new(RELEASE_SCRIPT)
            .key(&key)
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await?;

        debug!(lock_key = key.as_str(), deleted = deleted, "Released lock");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(
            user_collection_key(UserId(12)),
            "bunny_offload:user:12:collection_id"
        );
        assert_eq!(post_video_key(PostId(7)), "bunny_offload:post:7:video");
        assert_eq!(
            post_thumbnail_key(PostId(7)),
            "bunny_offload:post:7:thumbnail_url"
        );
        assert_eq!(
            lock_key("wpbs_collection_lock_12"),
            "bunny_offload:lock:wpbs_collection_lock_12"
        );
    }

    #[test]
    fn test_open_does_not_connect() {
        assert!(RedisStore::new("redis://127.0.0.1:1/").is_ok());
    }
}
