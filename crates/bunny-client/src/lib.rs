//! Bunny.net REST API client.
//!
//! This crate provides:
//! - Signed JSON requests against the Stream and account APIs
//! - Collection, video and video library operations
//! - Account user and storage zone operations
//! - Streaming binary uploads
//! - Retry with exponential backoff and a shared Retry-After gate

pub mod client;
pub mod error;
pub mod metrics;
pub mod rate_gate;
pub mod retry;
pub mod types;


pub use client::{Api, BunnyClient, BunnyConfig, DEFAULT_API_BASE_URL, DEFAULT_VIDEO_BASE_URL};
pub use error::{BunnyError, BunnyResult};
pub use rate_gate::RateLimitGate;
pub use retry::RetryConfig;
pub use types::{
    AccountUser, Collection, CollectionUpdate, DeleteOutcome, Page, StatusResponse, StorageZone,
    Video, VideoLibrary,
};
