//! Bunny API request/response types.
//!
//! The Stream API (`video.bunnycdn.com`) speaks camelCase; the account API
//! (`api.bunny.net`) speaks PascalCase.

use serde::{Deserialize, Serialize};

use bunny_models::{CollectionId, LibraryId, VideoId, VideoStatus};

// =============================================================================
// Stream API
// =============================================================================

/// Paginated list envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub items_per_page: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// True when later pages may hold more items.
    pub fn has_more(&self, fetched_so_far: u64) -> bool {
        !self.items.is_empty() && fetched_so_far < self.total_items
    }
}

/// Collection within a video library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default)]
    pub video_library_id: Option<u64>,
    pub guid: CollectionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_video_ids: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateCollectionRequest<'a> {
    pub name: &'a str,
}

/// Partial collection update. Unset or blank fields are not sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CollectionUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// Drop blank values; `None` when nothing is left to send.
    pub fn pruned(&self) -> Option<CollectionUpdate> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        name.map(|name| CollectionUpdate { name: Some(name) })
    }
}

/// Video object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(default)]
    pub video_library_id: Option<u64>,
    pub guid: VideoId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date_uploaded: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub is_public: bool,
    /// Duration in seconds
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub framerate: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub collection_id: Option<CollectionId>,
    #[serde(default)]
    pub thumbnail_file_name: Option<String>,
    #[serde(default)]
    pub encode_progress: u32,
    #[serde(default)]
    pub storage_size: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateVideoRequest<'a> {
    pub title: &'a str,
    pub collection_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ThumbnailTimeRequest {
    pub time: u64,
}

/// Generic status envelope returned by mutating endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

/// Outcome of an idempotent delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// The remote object did not exist (already removed)
    AlreadyGone,
}

// =============================================================================
// Account API
// =============================================================================

/// Video library as returned by the account API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VideoLibrary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Stream API key scoped to this library
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub pull_zone_id: u64,
    #[serde(default)]
    pub player_token_authentication_enabled: bool,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, rename = "CDNHostname")]
    pub cdn_hostname: Option<String>,
}

impl VideoLibrary {
    pub fn library_id(&self) -> LibraryId {
        LibraryId(self.id)
    }

    /// CDN hostname serving this library.
    ///
    /// Falls back to the `vz-<md5 prefix>.b-cdn.net` form Bunny assigns when
    /// the API omits both hostname fields.
    pub fn resolved_hostname(&self) -> String {
        self.hostname
            .as_deref()
            .or(self.cdn_hostname.as_deref())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                let digest = format!("{:x}", md5::compute(self.id.to_string()));
                format!("vz-{}.b-cdn.net", &digest[..8])
            })
    }
}

/// Library listings come back either bare or wrapped in a paged envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum VideoLibraryList {
    Plain(Vec<VideoLibrary>),
    Paged {
        #[serde(rename = "Items")]
        items: Vec<VideoLibrary>,
    },
}

impl VideoLibraryList {
    pub fn into_items(self) -> Vec<VideoLibrary> {
        match self {
            VideoLibraryList::Plain(items) | VideoLibraryList::Paged { items } => items,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateVideoLibraryRequest<'a> {
    pub name: &'a str,
    pub replication_regions: Vec<String>,
}

/// Account owner as returned by `GET /user`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl AccountUser {
    /// "First Last", or `None` when both parts are blank.
    pub fn display_name(&self) -> Option<String> {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_empty() && self.first_name.is_empty() && self.last_name.is_empty()
    }
}

/// Edge storage zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageZone {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Read/write password used as the storage API key
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub read_only_password: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub replication_regions: Vec<String>,
    #[serde(default)]
    pub storage_hostname: Option<String>,
}

/// Edge tier; the standard tier is `0`.
pub(crate) const STORAGE_ZONE_TIER_EDGE: u8 = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateStorageZoneRequest<'a> {
    pub name: &'a str,
    pub region: String,
    pub replication_regions: Vec<String>,
    pub zone_tier: u8,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StorageZoneCronUpdate<'a> {
    #[serde(rename = "WordPressCronToken")]
    pub token: &'a str,
    #[serde(rename = "WordPressCronPath")]
    pub path: &'a str,
}

/// Trim, upper-case and drop empty region codes.
pub(crate) fn normalize_regions(regions: &[String]) -> Vec<String> {
    regions
        .iter()
        .map(|r| r.trim().to_uppercase())
        .filter(|r| !r.is_empty())
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<CollectionId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(CollectionId::from_string)
        .filter(|id| !id.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_page_decodes() {
        let json = r#"{
            "totalItems": 1,
            "currentPage": 1,
            "itemsPerPage": 100,
            "items": [
                {"videoLibraryId": 7, "guid": "c-1", "name": "wpbs_5", "videoCount": 2, "totalSize": 1024}
            ]
        }"#;
        let page: Page<Collection> = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].guid.as_str(), "c-1");
        assert_eq!(page.items[0].name, "wpbs_5");
        assert!(!page.has_more(1));
    }

    #[test]
    fn test_page_without_items_is_rejected() {
        let result: Result<Page<Collection>, _> = serde_json::from_str(r#"{"totalItems": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_video_decodes_empty_collection_as_none() {
        let json = r#"{"guid": "v-1", "title": "clip.mp4", "status": 4, "collectionId": ""}"#;
        let video: Video = serde_json::from_str(json).unwrap();
        assert_eq!(video.status, VideoStatus::Finished);
        assert!(video.collection_id.is_none());
    }

    #[test]
    fn test_collection_update_pruned() {
        assert!(CollectionUpdate::default().pruned().is_none());
        assert!(CollectionUpdate::rename("   ").pruned().is_none());
        assert_eq!(
            CollectionUpdate::rename(" renamed ").pruned().unwrap().name.as_deref(),
            Some("renamed")
        );
    }

    #[test]
    fn test_library_hostname_fallbacks() {
        let mut library: VideoLibrary = serde_json::from_str(
            r#"{"Id": 123, "Name": "main", "ApiKey": "k", "PullZoneId": 9, "CDNHostname": "vz-cdn.b-cdn.net"}"#,
        )
        .unwrap();
        assert_eq!(library.resolved_hostname(), "vz-cdn.b-cdn.net");

        library.cdn_hostname = None;
        let derived = library.resolved_hostname();
        assert!(derived.starts_with("vz-"));
        assert!(derived.ends_with(".b-cdn.net"));
        assert_eq!(derived.len(), "vz-".len() + 8 + ".b-cdn.net".len());
    }

    #[test]
    fn test_library_list_shapes() {
        let plain: VideoLibraryList = serde_json::from_str(r#"[{"Id": 1}]"#).unwrap();
        assert_eq!(plain.into_items().len(), 1);

        let paged: VideoLibraryList =
            serde_json::from_str(r#"{"Items": [{"Id": 1}, {"Id": 2}], "HasMoreItems": false}"#).unwrap();
        assert_eq!(paged.into_items().len(), 2);
    }

    #[test]
    fn test_account_user_display_name() {
        let user: AccountUser =
            serde_json::from_str(r#"{"Email": "a@b.c", "FirstName": "Ada", "LastName": ""}"#).unwrap();
        assert_eq!(user.display_name().as_deref(), Some("Ada"));
        assert!(!user.is_empty());

        let blank: AccountUser = serde_json::from_str("{}").unwrap();
        assert!(blank.display_name().is_none());
        assert!(blank.is_empty());
    }

    #[test]
    fn test_storage_zone_requests_are_pascal_case() {
        let create = CreateStorageZoneRequest {
            name: "media",
            region: "DE".to_string(),
            replication_regions: normalize_regions(&[" ny ".to_string(), "".to_string()]),
            zone_tier: STORAGE_ZONE_TIER_EDGE,
        };
        assert_eq!(
            serde_json::to_value(&create).unwrap(),
            serde_json::json!({"Name": "media", "Region": "DE", "ReplicationRegions": ["NY"], "ZoneTier": 1})
        );

        let cron = StorageZoneCronUpdate { token: "t", path: "/wp-cron" };
        assert_eq!(
            serde_json::to_value(&cron).unwrap(),
            serde_json::json!({"WordPressCronToken": "t", "WordPressCronPath": "/wp-cron"})
        );
    }
}
