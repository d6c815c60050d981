//! Shared data models for Bunny Stream offloading.
//!
//! This crate provides Serde-serializable types for:
//! - Identifiers (users, posts, libraries, collections, videos)
//! - Video encoding status as reported by Bunny Stream
//! - Per-post video metadata records
//! - Playback, embed and thumbnail URL construction

pub mod ids;
pub mod urls;
pub mod video;

// Re-export common types
pub use ids::{CollectionId, LibraryId, PostId, UserId, VideoId};
pub use urls::{iframe_embed_url, playback_mp4_url, thumbnail_url, DEFAULT_PULL_ZONE};
pub use video::{PlaybackMode, PlaybackUrls, VideoMetadata, VideoStatus};
