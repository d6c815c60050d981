//! Bunny API metrics collection.
//!
//! Every series carries an `api` label (`stream` or `account`) so the two
//! Bunny endpoints can be told apart on dashboards.

use metrics::{counter, histogram};

use crate::client::Api;

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Bunny API requests by api, operation and HTTP status (0 = no response).
    pub const REQUESTS_TOTAL: &str = "bunny_requests_total";

    /// Retry attempts by api and operation.
    pub const RETRIES_TOTAL: &str = "bunny_retries_total";

    /// Request latency in seconds by api and operation.
    pub const LATENCY_SECONDS: &str = "bunny_request_latency_seconds";

    /// 429 responses by api; each one closes the shared rate gate.
    pub const RATE_LIMITED_TOTAL: &str = "bunny_rate_limited_total";

    /// Video bytes successfully PUT to Bunny Stream.
    pub const UPLOAD_BYTES_TOTAL: &str = "bunny_upload_bytes_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a completed Bunny API call.
pub fn record_request(api: Api, operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "api" => api.as_str(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "api" => api.as_str(),
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);

    if status == 429 {
        counter!(names::RATE_LIMITED_TOTAL, "api" => api.as_str()).increment(1);
    }
}

pub fn record_retry(api: Api, operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "api" => api.as_str(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

pub fn record_upload_bytes(bytes: u64) {
    counter!(names::UPLOAD_BYTES_TOTAL, "api" => Api::Stream.as_str()).increment(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_bunny_scoped() {
        for name in [
            names::REQUESTS_TOTAL,
            names::RETRIES_TOTAL,
            names::LATENCY_SECONDS,
            names::RATE_LIMITED_TOTAL,
            names::UPLOAD_BYTES_TOTAL,
        ] {
            assert!(name.starts_with("bunny_"), "{}", name);
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request(Api::Account, "list_video_libraries", 429, 12.0);
        record_retry(Api::Stream, "upload_video");
        record_upload_bytes(1024);
    }
}
