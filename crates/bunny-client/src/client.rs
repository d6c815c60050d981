//! Bunny.net REST API client.
//!
//! - Two base endpoints: the Stream API for library-scoped collection and
//!   video operations, the account API for video library management
//! - `AccessKey` authentication
//! - Exponential backoff with jitter, Retry-After shared across clones
//! - Observability (tracing spans, metrics)

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, info_span, Instrument};

use bunny_models::{CollectionId, LibraryId, VideoId, VideoStatus};

use crate::error::{BunnyError, BunnyResult};
use crate::metrics::{record_request, record_upload_bytes};
use crate::rate_gate::RateLimitGate;
use crate::retry::RetryConfig;
use crate::types::{
    normalize_regions, AccountUser, Collection, CollectionUpdate, CreateCollectionRequest,
    CreateStorageZoneRequest, CreateVideoLibraryRequest, CreateVideoRequest, DeleteOutcome, Page,
    StatusResponse, StorageZone, StorageZoneCronUpdate, ThumbnailTimeRequest, Video, VideoLibrary,
    VideoLibraryList, STORAGE_ZONE_TIER_EDGE,
};

/// Stream API base URL.
pub const DEFAULT_VIDEO_BASE_URL: &str = "https://video.bunnycdn.com/";

/// Account API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.bunny.net/";

const ACCESS_KEY_HEADER: &str = "AccessKey";

/// Page size used when scanning every collection in a library.
pub const COLLECTIONS_PAGE_SIZE: u32 = 100;

/// Upper bound on pages scanned by `list_all_collections`.
const MAX_COLLECTION_PAGES: u32 = 100;

// =============================================================================
// Configuration
// =============================================================================

/// Bunny client configuration.
#[derive(Debug, Clone)]
pub struct BunnyConfig {
    /// Stream library API key
    pub access_key: String,
    /// Video library the Stream calls operate on
    pub library_id: Option<LibraryId>,
    /// Account API key; falls back to `access_key`
    pub account_api_key: Option<String>,
    /// Stream API base URL
    pub video_base_url: String,
    /// Account API base URL
    pub api_base_url: String,
    /// Request timeout for JSON calls
    pub timeout: Duration,
    /// Request timeout for binary uploads
    pub upload_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl BunnyConfig {
    /// Config with default endpoints and timeouts.
    pub fn new(access_key: impl Into<String>, library_id: Option<LibraryId>) -> Self {
        Self {
            access_key: access_key.into(),
            library_id,
            account_api_key: None,
            video_base_url: DEFAULT_VIDEO_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> BunnyResult<Self> {
        let access_key = std::env::var("BUNNY_ACCESS_KEY")
            .map_err(|_| BunnyError::config_error("BUNNY_ACCESS_KEY must be set"))?;

        if access_key.trim().is_empty() {
            return Err(BunnyError::config_error("BUNNY_ACCESS_KEY cannot be empty"));
        }

        let library_id = match std::env::var("BUNNY_LIBRARY_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.parse::<LibraryId>().map_err(|e| {
                BunnyError::config_error(format!("BUNNY_LIBRARY_ID is not a number: {}", e))
            })?),
            _ => None,
        };

        let connect_timeout_secs: u64 = std::env::var("BUNNY_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let upload_timeout_secs: u64 = std::env::var("BUNNY_UPLOAD_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        Ok(Self {
            access_key: access_key.trim().to_string(),
            library_id,
            account_api_key: std::env::var("BUNNY_ACCOUNT_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            video_base_url: std::env::var("BUNNY_VIDEO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_VIDEO_BASE_URL.to_string()),
            api_base_url: std::env::var("BUNNY_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(upload_timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

/// Which Bunny API a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    /// `video.bunnycdn.com`: libraries' collections and videos
    Stream,
    /// `api.bunny.net`: account-level library management
    Account,
}

impl Api {
    /// Metric label for this API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::Stream => "stream",
            Api::Account => "account",
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Bunny.net REST API client.
///
/// Cheap to clone; clones share the connection pool and the rate-limit gate.
#[derive(Clone)]
pub struct BunnyClient {
    http: Client,
    config: Arc<BunnyConfig>,
    gate: Arc<RateLimitGate>,
}

impl BunnyClient {
    /// Create a new Bunny client.
    pub fn new(config: BunnyConfig) -> BunnyResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("bunny-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BunnyError::Network)?;

        Ok(Self {
            http,
            config: Arc::new(config),
            gate: Arc::new(RateLimitGate::new()),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> BunnyResult<Self> {
        Self::new(BunnyConfig::from_env()?)
    }

    pub fn config(&self) -> &BunnyConfig {
        &self.config
    }

    /// Configured video library, if any.
    pub fn library_id(&self) -> Option<LibraryId> {
        self.config.library_id
    }

    /// Shared rate-limit gate.
    pub fn rate_gate(&self) -> &RateLimitGate {
        &self.gate
    }

    fn require_library(&self, action: &'static str) -> BunnyResult<LibraryId> {
        self.config
            .library_id
            .ok_or(BunnyError::MissingLibraryId(action))
    }

    fn base_url(&self, api: Api) -> &str {
        match api {
            Api::Stream => &self.config.video_base_url,
            Api::Account => &self.config.api_base_url,
        }
    }

    fn access_key(&self, api: Api) -> &str {
        match api {
            Api::Stream => &self.config.access_key,
            Api::Account => self
                .config
                .account_api_key
                .as_deref()
                .unwrap_or(&self.config.access_key),
        }
    }

    /// Build the full URL for an endpoint.
    pub fn url(&self, api: Api, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url(api).trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Parse and validate an HTTP method. Only GET, POST, PUT and DELETE are used.
    pub fn parse_method(method: &str) -> BunnyResult<Method> {
        match method.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(BunnyError::InvalidMethod(method.to_string())),
        }
    }

    // =========================================================================
    // Generic JSON requests
    // =========================================================================

    /// Send a JSON request to Bunny with retry and decode the response.
    ///
    /// GET requests and empty payloads are sent without a body.
    pub async fn request_json<T, B>(
        &self,
        api: Api,
        method: &str,
        endpoint: &str,
        body: Option<&B>,
    ) -> BunnyResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let method = Self::parse_method(method)?;
        self.send_json("request_json", api, method, endpoint, body)
            .await
    }

    async fn send_json<T, B>(
        &self,
        operation: &str,
        api: Api,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> BunnyResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = match body {
            Some(b) if method != Method::GET => {
                let encoded = serde_json::to_vec(b)?;
                (!is_empty_json(&encoded)).then(|| Bytes::from(encoded))
            }
            _ => None,
        };

        let url = self.url(api, endpoint);

        debug!(
            operation = %operation,
            method = %method,
            endpoint = %endpoint,
            library_id = ?self.config.library_id,
            body_bytes = payload.as_ref().map(|p| p.len()).unwrap_or(0),
            "Sending Bunny API request"
        );

        let text = self
            .with_retry(api, operation, || async {
                let mut request = self
                    .http
                    .request(method.clone(), &url)
                    .header(ACCESS_KEY_HEADER, self.access_key(api))
                    .header(ACCEPT, "application/json");

                if let Some(p) = &payload {
                    request = request
                        .header(CONTENT_TYPE, "application/json")
                        .body(p.clone());
                }

                self.execute_request(api, operation, endpoint, request).await
            })
            .await?;

        decode_body(&text)
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, api: Api, operation: &str, op: F) -> BunnyResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = BunnyResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, &self.gate, api, operation, op).await
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// List one page of collections in the configured library.
    pub async fn list_collections(&self, page: u32, items_per_page: u32) -> BunnyResult<Page<Collection>> {
        let library_id = self.require_library("list collections")?;
        let endpoint = format!(
            "library/{}/collections?page={}&itemsPerPage={}",
            library_id,
            page.max(1),
            items_per_page.clamp(1, 1000)
        );

        self.send_json::<_, ()>("list_collections", Api::Stream, Method::GET, &endpoint, None)
            .await
    }

    /// List every collection in the configured library.
    pub async fn list_all_collections(&self) -> BunnyResult<Vec<Collection>> {
        let mut all = Vec::new();

        for page_number in 1..=MAX_COLLECTION_PAGES {
            let page = self.list_collections(page_number, COLLECTIONS_PAGE_SIZE).await?;
            let fetched = all.len() as u64 + page.items.len() as u64;
            let has_more = page.has_more(fetched);
            all.extend(page.items);
            if !has_more {
                break;
            }
        }

        Ok(all)
    }

    /// Find a collection by exact name.
    pub async fn find_collection_by_name(&self, name: &str) -> BunnyResult<Option<Collection>> {
        let collections = self.list_all_collections().await?;
        Ok(collections.into_iter().find(|c| c.name == name))
    }

    /// Get a collection. Returns `None` when it no longer exists.
    pub async fn get_collection(&self, collection_id: &CollectionId) -> BunnyResult<Option<Collection>> {
        let library_id = self.require_library("fetch a collection")?;
        if collection_id.is_empty() {
            return Err(BunnyError::MissingCollectionId);
        }

        let endpoint = format!("library/{}/collections/{}", library_id, collection_id);
        match self
            .send_json::<Collection, ()>("get_collection", Api::Stream, Method::GET, &endpoint, None)
            .await
        {
            Ok(collection) => Ok(Some(collection)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create a collection.
    pub async fn create_collection(&self, name: &str) -> BunnyResult<Collection> {
        let library_id = self.require_library("create a collection")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(BunnyError::MissingCollectionName);
        }

        let endpoint = format!("library/{}/collections", library_id);
        let collection: Collection = self
            .send_json(
                "create_collection",
                Api::Stream,
                Method::POST,
                &endpoint,
                Some(&CreateCollectionRequest { name }),
            )
            .await?;

        if collection.guid.is_empty() {
            return Err(BunnyError::invalid_response(
                "collection created without a guid",
            ));
        }

        info!(collection_id = %collection.guid, name = %name, "Created Bunny collection");
        Ok(collection)
    }

    /// Update a collection. Blank fields are dropped before sending.
    pub async fn update_collection(
        &self,
        collection_id: &CollectionId,
        update: &CollectionUpdate,
    ) -> BunnyResult<StatusResponse> {
        let library_id = self.require_library("update a collection")?;
        if collection_id.is_empty() {
            return Err(BunnyError::MissingCollectionId);
        }
        let update = update.pruned().ok_or(BunnyError::NoUpdateData)?;

        let endpoint = format!("library/{}/collections/{}", library_id, collection_id);
        let status: Option<StatusResponse> = self
            .send_json("update_collection", Api::Stream, Method::POST, &endpoint, Some(&update))
            .await?;
        Ok(status.unwrap_or_default())
    }

    /// Delete a collection. A collection that is already gone counts as deleted.
    pub async fn delete_collection(&self, collection_id: &CollectionId) -> BunnyResult<DeleteOutcome> {
        let library_id = self.require_library("delete a collection")?;
        if collection_id.is_empty() {
            return Err(BunnyError::MissingCollectionId);
        }

        let endpoint = format!("library/{}/collections/{}", library_id, collection_id);
        let result = self
            .send_json::<Option<StatusResponse>, ()>(
                "delete_collection",
                Api::Stream,
                Method::DELETE,
                &endpoint,
                None,
            )
            .await;

        let outcome = delete_outcome(&endpoint, result)?;
        info!(collection_id = %collection_id, outcome = ?outcome, "Deleted Bunny collection");
        Ok(outcome)
    }

    // =========================================================================
    // Videos
    // =========================================================================

    /// Create a video object inside a collection.
    pub async fn create_video(&self, title: &str, collection_id: &CollectionId) -> BunnyResult<Video> {
        let library_id = self.require_library("create a video object")?;
        let collection_id = collection_id.as_str().trim();
        if collection_id.is_empty() {
            return Err(BunnyError::MissingCollectionId);
        }

        let endpoint = format!("library/{}/videos", library_id);
        let video: Video = self
            .send_json(
                "create_video",
                Api::Stream,
                Method::POST,
                &endpoint,
                Some(&CreateVideoRequest {
                    title,
                    collection_id,
                }),
            )
            .await?;

        if video.guid.is_empty() {
            return Err(BunnyError::invalid_response("video created without a guid"));
        }

        Ok(video)
    }

    /// Get a video.
    pub async fn get_video(&self, video_id: &VideoId) -> BunnyResult<Video> {
        let library_id = self.require_library("fetch a video")?;
        if video_id.is_empty() {
            return Err(BunnyError::MissingVideoId);
        }

        let endpoint = format!("library/{}/videos/{}", library_id, video_id);
        self.send_json::<_, ()>("get_video", Api::Stream, Method::GET, &endpoint, None)
            .await
    }

    /// List videos, optionally restricted to one collection.
    pub async fn list_videos(
        &self,
        collection_id: Option<&CollectionId>,
        page: u32,
        items_per_page: u32,
    ) -> BunnyResult<Page<Video>> {
        let library_id = self.require_library("list videos")?;
        let mut endpoint = format!(
            "library/{}/videos?page={}&itemsPerPage={}",
            library_id,
            page.max(1),
            items_per_page.clamp(1, 1000)
        );
        if let Some(collection) = collection_id.filter(|c| !c.is_empty()) {
            endpoint.push_str(&format!("&collection={}", urlencoding::encode(collection.as_str())));
        }

        self.send_json::<_, ()>("list_videos", Api::Stream, Method::GET, &endpoint, None)
            .await
    }

    /// Encoding status of a video.
    pub async fn video_status(&self, video_id: &VideoId) -> BunnyResult<VideoStatus> {
        Ok(self.get_video(video_id).await?.status)
    }

    /// True once encoding has finished.
    pub async fn is_video_ready(&self, video_id: &VideoId) -> BunnyResult<bool> {
        Ok(self.video_status(video_id).await?.is_ready())
    }

    /// Upload a video body held in memory.
    pub async fn upload_video_bytes(&self, video_id: &VideoId, data: Bytes) -> BunnyResult<StatusResponse> {
        let library_id = self.require_library("upload a video")?;
        if video_id.is_empty() {
            return Err(BunnyError::MissingVideoId);
        }

        let endpoint = format!("library/{}/videos/{}", library_id, video_id);
        let url = self.url(Api::Stream, &endpoint);
        let size = data.len() as u64;

        debug!(video_id = %video_id, bytes = size, "Uploading video body");

        let text = self
            .with_retry(Api::Stream, "upload_video", || async {
                let request = self
                    .upload_request(&url)
                    .header(CONTENT_LENGTH, size)
                    .body(data.clone());
                self.execute_request(Api::Stream, "upload_video", &endpoint, request).await
            })
            .await?;

        record_upload_bytes(size);
        let status: Option<StatusResponse> = decode_body(&text)?;
        Ok(status.unwrap_or_default())
    }

    /// Upload a video by streaming a file from disk.
    ///
    /// The file is reopened for every attempt.
    pub async fn upload_video_file(&self, video_id: &VideoId, path: &Path) -> BunnyResult<StatusResponse> {
        let library_id = self.require_library("upload a video")?;
        if video_id.is_empty() {
            return Err(BunnyError::MissingVideoId);
        }

        let endpoint = format!("library/{}/videos/{}", library_id, video_id);
        let url = self.url(Api::Stream, &endpoint);
        let size = tokio::fs::metadata(path).await?.len();

        debug!(video_id = %video_id, path = %path.display(), bytes = size, "Streaming video body");

        let text = self
            .with_retry(Api::Stream, "upload_video", || async {
                let file = tokio::fs::File::open(path).await?;
                let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
                let request = self
                    .upload_request(&url)
                    .header(CONTENT_LENGTH, size)
                    .body(body);
                self.execute_request(Api::Stream, "upload_video", &endpoint, request).await
            })
            .await?;

        record_upload_bytes(size);
        let status: Option<StatusResponse> = decode_body(&text)?;
        Ok(status.unwrap_or_default())
    }

    fn upload_request(&self, url: &str) -> RequestBuilder {
        self.http
            .put(url)
            .timeout(self.config.upload_timeout)
            .header(ACCESS_KEY_HEADER, self.access_key(Api::Stream))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/octet-stream")
    }

    /// Delete a video. A video that is already gone counts as deleted.
    pub async fn delete_video(&self, video_id: &VideoId) -> BunnyResult<DeleteOutcome> {
        let library_id = self.require_library("delete a video")?;
        if video_id.is_empty() {
            return Err(BunnyError::MissingVideoId);
        }

        let endpoint = format!("library/{}/videos/{}", library_id, video_id);
        let result = self
            .send_json::<Option<StatusResponse>, ()>(
                "delete_video",
                Api::Stream,
                Method::DELETE,
                &endpoint,
                None,
            )
            .await;

        let outcome = delete_outcome(&endpoint, result)?;
        info!(video_id = %video_id, outcome = ?outcome, "Deleted Bunny video");
        Ok(outcome)
    }

    /// Pick the thumbnail frame at `seconds` into the video.
    pub async fn set_thumbnail_time(&self, video_id: &VideoId, seconds: u64) -> BunnyResult<StatusResponse> {
        let library_id = self.require_library("set a thumbnail")?;
        if video_id.is_empty() {
            return Err(BunnyError::MissingVideoId);
        }

        let endpoint = format!("library/{}/videos/{}/thumbnail", library_id, video_id);
        let status: Option<StatusResponse> = self
            .send_json(
                "set_thumbnail",
                Api::Stream,
                Method::POST,
                &endpoint,
                Some(&ThumbnailTimeRequest { time: seconds }),
            )
            .await?;
        Ok(status.unwrap_or_default())
    }

    // =========================================================================
    // Account API: video libraries
    // =========================================================================

    /// List the account's video libraries.
    pub async fn list_video_libraries(&self) -> BunnyResult<Vec<VideoLibrary>> {
        let list: VideoLibraryList = self
            .send_json::<_, ()>("list_video_libraries", Api::Account, Method::GET, "videolibrary", None)
            .await?;
        Ok(list.into_items())
    }

    /// Get one video library.
    pub async fn get_video_library(&self, library_id: LibraryId) -> BunnyResult<VideoLibrary> {
        let endpoint = format!("videolibrary/{}", library_id);
        self.send_json::<_, ()>("get_video_library", Api::Account, Method::GET, &endpoint, None)
            .await
    }

    /// Create a video library. Replication region codes are upper-cased.
    pub async fn create_video_library(
        &self,
        name: &str,
        replication_regions: &[String],
    ) -> BunnyResult<VideoLibrary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BunnyError::MissingLibraryName);
        }

        let request = CreateVideoLibraryRequest {
            name,
            replication_regions: normalize_regions(replication_regions),
        };

        let library: VideoLibrary = self
            .send_json("create_video_library", Api::Account, Method::POST, "videolibrary", Some(&request))
            .await?;

        info!(library_id = library.id, name = %name, "Created Bunny video library");
        Ok(library)
    }

    // =========================================================================
    // Account API: user and storage zones
    // =========================================================================

    /// Get the account owner.
    pub async fn get_user(&self) -> BunnyResult<AccountUser> {
        let user: Option<AccountUser> = self
            .send_json::<_, ()>("get_user", Api::Account, Method::GET, "user", None)
            .await?;
        user.filter(|u| !u.is_empty()).ok_or(BunnyError::EmptyUser)
    }

    /// Get one storage zone.
    pub async fn get_storage_zone(&self, zone_id: u64) -> BunnyResult<StorageZone> {
        if zone_id == 0 {
            return Err(BunnyError::InvalidStorageZoneId);
        }
        let endpoint = format!("storagezone/{}", zone_id);
        self.send_json::<_, ()>("get_storage_zone", Api::Account, Method::GET, &endpoint, None)
            .await
    }

    /// Create an edge-tier storage zone. Region codes are upper-cased.
    pub async fn create_storage_zone(
        &self,
        name: &str,
        region: &str,
        replication_regions: &[String],
    ) -> BunnyResult<StorageZone> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BunnyError::config_error("Storage zone name is required"));
        }

        let request = CreateStorageZoneRequest {
            name,
            region: region.trim().to_uppercase(),
            replication_regions: normalize_regions(replication_regions),
            zone_tier: STORAGE_ZONE_TIER_EDGE,
        };

        let zone: StorageZone = self
            .send_json("create_storage_zone", Api::Account, Method::POST, "storagezone", Some(&request))
            .await?;

        info!(zone_id = zone.id, name = %name, region = %request.region, "Created Bunny storage zone");
        Ok(zone)
    }

    /// Register the site's sync cron path and token on a storage zone.
    pub async fn update_storage_zone_cron(
        &self,
        zone_id: u64,
        path_prefix: &str,
        sync_token: &str,
    ) -> BunnyResult<StatusResponse> {
        if zone_id == 0 {
            return Err(BunnyError::InvalidStorageZoneId);
        }

        let endpoint = format!("storagezone/{}", zone_id);
        let update = StorageZoneCronUpdate {
            token: sync_token,
            path: path_prefix,
        };
        let status: Option<StatusResponse> = self
            .send_json("update_storage_zone_cron", Api::Account, Method::POST, &endpoint, Some(&update))
            .await?;
        Ok(status.unwrap_or_default())
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Execute a single request with tracing and metrics.
    async fn execute_request(
        &self,
        api: Api,
        operation: &str,
        endpoint: &str,
        request: RequestBuilder,
    ) -> BunnyResult<String> {
        let span = info_span!(
            "bunny_request",
            api = api.as_str(),
            operation = %operation,
            endpoint = %endpoint
        );

        let start = Instant::now();
        let result: BunnyResult<(u16, String)> = async {
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                let body = response.text().await?;
                Ok((status.as_u16(), body))
            } else {
                Err(Self::handle_error_response(endpoint, response).await)
            }
        }
        .instrument(span)
        .await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok((status, _)) => *status,
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request(api, operation, status, latency_ms);

        result.map(|(_, body)| body)
    }

    async fn handle_error_response(endpoint: &str, response: reqwest::Response) -> BunnyError {
        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let body = if body.is_empty() {
            "No response body".to_string()
        } else {
            body
        };
        BunnyError::from_http_status(status, format!("{} failed: {}", endpoint, body), retry_after)
    }
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn is_empty_json(encoded: &[u8]) -> bool {
    matches!(encoded, b"null" | b"{}" | b"[]")
}

fn decode_body<T: DeserializeOwned>(text: &str) -> BunnyResult<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| {
        let prefix: String = text.chars().take(200).collect();
        BunnyError::invalid_response(format!("{} (body prefix: {})", e, prefix))
    })
}

/// Fold a delete response into an outcome.
///
/// Bunny sometimes reports failure inside a 200 body, so `statusCode` is
/// checked as well as the HTTP status.
fn delete_outcome(
    endpoint: &str,
    result: BunnyResult<Option<StatusResponse>>,
) -> BunnyResult<DeleteOutcome> {
    match result {
        Ok(Some(StatusResponse {
            status_code: Some(404),
            ..
        })) => Ok(DeleteOutcome::AlreadyGone),
        Ok(Some(StatusResponse {
            status_code: Some(code),
            message,
            ..
        })) if code >= 400 => Err(BunnyError::from_http_status(
            code,
            format!("{} failed: {}", endpoint, message.unwrap_or_default()),
            None,
        )),
        Ok(_) => Ok(DeleteOutcome::Deleted),
        Err(e) if e.is_not_found() => {
            debug!(endpoint = %endpoint, "Already deleted (idempotent)");
            Ok(DeleteOutcome::AlreadyGone)
        }
        Err(e) => Err(e),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serial_test::serial;

    #[test]
    fn test_parse_method() {
        assert_eq!(BunnyClient::parse_method("get").unwrap(), Method::GET);
        assert_eq!(BunnyClient::parse_method("DELETE").unwrap(), Method::DELETE);

        let err = BunnyClient::parse_method("PATCH").unwrap_err();
        assert_eq!(err.code(), "invalid_http_method");
    }

    #[test]
    fn test_url_trims_slashes() {
        let client = BunnyClient::new(BunnyConfig::new("key", Some(LibraryId(1)))).unwrap();
        assert_eq!(
            client.url(Api::Stream, "/library/1/videos"),
            "https://video.bunnycdn.com/library/1/videos"
        );
        assert_eq!(
            client.url(Api::Account, "videolibrary"),
            "https://api.bunny.net/videolibrary"
        );
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 5 "));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_decode_empty_body_as_unit() {
        let value: Option<StatusResponse> = decode_body("").unwrap();
        assert!(value.is_none());

        let err = decode_body::<Collection>("<html>").unwrap_err();
        assert_eq!(err.code(), "invalid_response");
    }

    #[test]
    fn test_delete_outcome_from_body_status() {
        let gone = delete_outcome(
            "x",
            Ok(Some(StatusResponse {
                success: false,
                message: None,
                status_code: Some(404),
            })),
        );
        assert_eq!(gone.unwrap(), DeleteOutcome::AlreadyGone);

        let denied = delete_outcome(
            "x",
            Ok(Some(StatusResponse {
                success: false,
                message: Some("bad key".into()),
                status_code: Some(401),
            })),
        );
        assert!(matches!(denied.unwrap_err(), BunnyError::Unauthorized(_)));

        let http_404 = delete_outcome("x", Err(BunnyError::not_found("x")));
        assert_eq!(http_404.unwrap(), DeleteOutcome::AlreadyGone);
    }

    #[test]
    #[serial]
    fn test_config_from_env_requires_access_key() {
        std::env::remove_var("BUNNY_ACCESS_KEY");
        let result = BunnyConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::set_var("BUNNY_ACCESS_KEY", "test-key");
        std::env::remove_var("BUNNY_LIBRARY_ID");
        std::env::remove_var("BUNNY_CONNECT_TIMEOUT_SECS");
        let config = BunnyConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.video_base_url, DEFAULT_VIDEO_BASE_URL);
        assert!(config.library_id.is_none());
    }
}
