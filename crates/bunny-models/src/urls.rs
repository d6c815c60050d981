//! Public URL construction for offloaded videos.

use crate::ids::{LibraryId, VideoId};

/// CDN host used when no pull zone is configured.
pub const DEFAULT_PULL_ZONE: &str = "video.bunnycdn.com";

/// Host serving Bunny's embeddable player.
pub const EMBED_HOST: &str = "iframe.mediadelivery.net";

/// Default MP4 rendition.
pub const DEFAULT_RENDITION: &str = "play_720p.mp4";

fn pull_zone_host(pull_zone: &str) -> &str {
    let host = pull_zone
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if host.is_empty() {
        DEFAULT_PULL_ZONE
    } else {
        host
    }
}

/// Direct MP4 playback URL on the pull zone.
pub fn playback_mp4_url(pull_zone: &str, video_id: &VideoId) -> String {
    format!(
        "https://{}/{}/{}",
        pull_zone_host(pull_zone),
        video_id,
        DEFAULT_RENDITION
    )
}

/// Iframe player URL.
pub fn iframe_embed_url(library_id: LibraryId, video_id: &VideoId) -> String {
    format!("https://{}/embed/{}/{}", EMBED_HOST, library_id, video_id)
}

/// Static thumbnail URL on the pull zone.
pub fn thumbnail_url(pull_zone: &str, video_id: &VideoId) -> String {
    format!("https://{}/{}/thumbnail.jpg", pull_zone_host(pull_zone), video_id)
}
