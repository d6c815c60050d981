//! Retry policy with exponential backoff and jitter.
//!
//! - Exponential backoff with full jitter, never below the base delay
//! - Respects Retry-After on 429; every 429 closes the shared rate-limit gate
//! - Terminal `RetriesExhausted` once the attempt budget is spent

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::client::Api;
use crate::error::{BunnyError, BunnyResult};
use crate::metrics::record_retry;
use crate::rate_gate::RateLimitGate;

// =============================================================================
// Configuration
// =============================================================================

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_attempts: u32 = std::env::var("BUNNY_RETRY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_attempts);

        let base_delay_ms: u64 = std::env::var("BUNNY_RETRY_BASE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.base_delay_ms);

        let max_delay_ms: u64 = std::env::var("BUNNY_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_delay_ms);

        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Execute an async operation with retry.
///
/// Retries on:
/// - Network errors (connect, timeout)
/// - HTTP 429 (Too Many Requests) - honors Retry-After
/// - HTTP 5xx (Server errors)
///
/// Does NOT retry:
/// - HTTP 4xx (except 429)
/// - Validation and decoding errors
///
/// Every 429 closes the shared gate: for the Retry-After duration when the
/// response carries one, otherwise for the computed back-off.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    gate: &RateLimitGate,
    api: Api,
    operation: &str,
    op: F,
) -> BunnyResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = BunnyResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        gate.wait().await;

        let span = info_span!("bunny_retry", operation = %operation, attempt = attempt + 1);
        let result = op().instrument(span).await;

        let err = match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };

        let delay = calculate_delay(config, attempt, err.retry_after());
        if err.is_rate_limited() {
            gate.defer(delay).await;
        }

        if attempt + 1 == max_attempts {
            warn!(
                operation = %operation,
                attempts = max_attempts,
                "Bunny API call failed after all attempts: {}",
                err
            );
            return Err(BunnyError::RetriesExhausted {
                attempts: max_attempts,
                last: Box::new(err),
            });
        }

        warn!(
            operation = %operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Bunny API call failed, retrying: {}",
            err
        );

        record_retry(api, operation);

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Calculate retry delay with exponential backoff and full jitter.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after: Option<Duration>) -> Duration {
    // Honor Retry-After if present
    if let Some(after) = retry_after {
        return after;
    }

    // base * 2^attempt
    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped_delay = exp_delay.min(config.max_delay_ms);

    // Full jitter from the clock's sub-second nanos; no rand crate needed
    let jittered = if capped_delay > 0 {
        use std::time::SystemTime;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        ((capped_delay as f64) * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms.min(config.max_delay_ms)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
    }

    #[test]
    fn test_calculate_delay_with_retry_after() {
        let config = RetryConfig::default();
        let delay = calculate_delay(&config, 0, Some(Duration::from_secs(5)));
        assert_eq!(delay, Duration::from_secs(5));
    }

    #[test]
    fn test_calculate_delay_respects_max() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 2000,
        };
        let delay = calculate_delay(&config, 10, None);
        assert!(delay.as_millis() <= 2000);
    }

    #[test]
    fn test_calculate_delay_minimum() {
        let config = RetryConfig::default();
        let delay = calculate_delay(&config, 0, None);
        assert!(delay.as_millis() >= config.base_delay_ms as u128);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let gate = RateLimitGate::new();

        let result = with_retry(&fast_config(3), &gate, Api::Stream, "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(BunnyError::from_http_status(503, "unavailable", None))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let gate = RateLimitGate::new();

        let result: BunnyResult<()> = with_retry(&fast_config(3), &gate, Api::Stream, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BunnyError::from_http_status(500, "boom", None))
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "api_failure");
        assert!(matches!(err, BunnyError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let gate = RateLimitGate::new();

        let result: BunnyResult<()> = with_retry(&fast_config(3), &gate, Api::Stream, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BunnyError::from_http_status(400, "bad request", None))
        })
        .await;

        assert!(matches!(result.unwrap_err(), BunnyError::Http { status: 400, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_retry_after() {
        let calls = AtomicU32::new(0);
        let gate = RateLimitGate::new();
        let start = tokio::time::Instant::now();

        let result = with_retry(&fast_config(3), &gate, Api::Stream, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(BunnyError::from_http_status(
                    429,
                    "slow down",
                    Some(Duration::from_secs(5)),
                ))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_without_retry_after_closes_gate() {
        let gate = RateLimitGate::new();

        let result: BunnyResult<()> = with_retry(&fast_config(1), &gate, Api::Account, "test", || async {
            Err(BunnyError::from_http_status(429, "slow down", None))
        })
        .await;

        assert!(matches!(result.unwrap_err(), BunnyError::RetriesExhausted { attempts: 1, .. }));
        assert!(gate.remaining().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_leaves_gate_open() {
        let gate = RateLimitGate::new();

        let result: BunnyResult<()> = with_retry(&fast_config(1), &gate, Api::Stream, "test", || async {
            Err(BunnyError::from_http_status(503, "unavailable", None))
        })
        .await;

        assert!(result.is_err());
        assert!(gate.remaining().await.is_none());
    }
}
