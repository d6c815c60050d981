//! Offload configuration.

use std::str::FromStr;
use std::time::Duration;

use bunny_client::BunnyConfig;

use crate::error::{OffloadError, OffloadResult};

/// Default upper bound on uploaded files (500 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Default remote collection name prefix.
pub const DEFAULT_COLLECTION_PREFIX: &str = "wpbs_";

/// How the video body is read before the PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Read the whole file into memory
    #[default]
    Memory,
    /// Stream the file from disk
    Stream,
}

impl FromStr for UploadMode {
    type Err = OffloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(UploadMode::Memory),
            "stream" => Ok(UploadMode::Stream),
            other => Err(OffloadError::config_error(format!(
                "unknown upload mode '{}', expected memory or stream",
                other
            ))),
        }
    }
}

/// Offload configuration.
#[derive(Debug, Clone)]
pub struct OffloadConfig {
    /// Bunny API client settings
    pub bunny: BunnyConfig,
    /// CDN pull zone hostname serving playback files
    pub pull_zone: Option<String>,
    /// Prefix for per-user collection names
    pub collection_prefix: String,
    /// Lifetime of the collection creation lock
    pub collection_lock_ttl: Duration,
    /// Largest accepted upload in bytes
    pub max_file_size: u64,
    pub upload_mode: UploadMode,
    /// Redis URL; the in-memory store is used when unset
    pub redis_url: Option<String>,
}

impl OffloadConfig {
    /// Config with defaults around an existing client config.
    pub fn new(bunny: BunnyConfig) -> Self {
        Self {
            bunny,
            pull_zone: None,
            collection_prefix: DEFAULT_COLLECTION_PREFIX.to_string(),
            collection_lock_ttl: Duration::from_secs(10),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            upload_mode: UploadMode::default(),
            redis_url: None,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> OffloadResult<Self> {
        let bunny = BunnyConfig::from_env()?;

        let upload_mode = match std::env::var("BUNNY_UPLOAD_MODE") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => UploadMode::default(),
        };

        Ok(Self {
            bunny,
            pull_zone: non_empty_var("BUNNY_PULL_ZONE"),
            collection_prefix: std::env::var("BUNNY_COLLECTION_PREFIX")
                .unwrap_or_else(|_| DEFAULT_COLLECTION_PREFIX.to_string()),
            collection_lock_ttl: Duration::from_secs(
                std::env::var("BUNNY_COLLECTION_LOCK_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(10),
            ),
            max_file_size: std::env::var("BUNNY_MAX_FILE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            upload_mode,
            redis_url: non_empty_var("REDIS_URL"),
        })
    }

    /// Pull zone for playback URLs, if configured.
    pub fn pull_zone(&self) -> Option<&str> {
        self.pull_zone.as_deref().filter(|z| !z.trim().is_empty())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "BUNNY_PULL_ZONE",
            "BUNNY_COLLECTION_PREFIX",
            "BUNNY_COLLECTION_LOCK_TTL_SECS",
            "BUNNY_MAX_FILE_SIZE",
            "BUNNY_UPLOAD_MODE",
            "REDIS_URL",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_upload_mode_parse() {
        assert_eq!("Stream".parse::<UploadMode>().unwrap(), UploadMode::Stream);
        assert_eq!(" memory ".parse::<UploadMode>().unwrap(), UploadMode::Memory);
        assert_eq!("chunked".parse::<UploadMode>().unwrap_err().code(), "config_error");
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var("BUNNY_ACCESS_KEY", "key");

        let config = OffloadConfig::from_env().unwrap();
        assert_eq!(config.collection_prefix, "wpbs_");
        assert_eq!(config.collection_lock_ttl, Duration::from_secs(10));
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.upload_mode, UploadMode::Memory);
        assert!(config.pull_zone().is_none());
        assert!(config.redis_url.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("BUNNY_ACCESS_KEY", "key");
        std::env::set_var("BUNNY_PULL_ZONE", "zone.b-cdn.net");
        std::env::set_var("BUNNY_UPLOAD_MODE", "stream");
        std::env::set_var("BUNNY_COLLECTION_LOCK_TTL_SECS", "0");

        let config = OffloadConfig::from_env().unwrap();
        assert_eq!(config.pull_zone(), Some("zone.b-cdn.net"));
        assert_eq!(config.upload_mode, UploadMode::Stream);
        assert_eq!(config.collection_lock_ttl, Duration::from_secs(10));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_upload_mode() {
        clear_env();
        std::env::set_var("BUNNY_ACCESS_KEY", "key");
        std::env::set_var("BUNNY_UPLOAD_MODE", "carrier-pigeon");

        assert!(OffloadConfig::from_env().is_err());

        clear_env();
    }
}
