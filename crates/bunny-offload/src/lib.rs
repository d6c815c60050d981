//! Offload local media to Bunny.net Stream.
//!
//! This crate provides:
//! - Configuration from the environment
//! - Metadata and advisory lock stores (in-memory and Redis)
//! - Lazily created per-user collections
//! - The upload flow and per-post playback bookkeeping
//! - Logging setup for the `bunny-offload` binary

pub mod collections;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod upload;

pub use collections::{collection_lock_key, CollectionManager};
pub use config::{OffloadConfig, UploadMode};
pub use error::{OffloadError, OffloadResult};
pub use logging::{init_tracing, OperationLogger};
pub use store::{LockStore, LockToken, MemoryStore, MetadataStore, RedisStore, Stores};
pub use upload::{sniff_video_mime, OffloadService, ThumbnailOutcome, UploadOutcome, UploadRequest};
