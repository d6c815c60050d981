//! Shared rate-limit gate.
//!
//! When Bunny answers 429 the wait deadline is recorded here and every
//! clone of the client waits it out before its next request:
//! - Fast path: no deadline, or deadline already passed
//! - Slow path: sleep until the deadline
//! - Deadlines only move forward; a shorter hint never shortens an existing wait

use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Retry-after deadline shared across requests.
#[derive(Debug, Default)]
pub struct RateLimitGate {
    not_before: RwLock<Option<Instant>>,
}

impl RateLimitGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold further requests back for `delay`.
    pub async fn defer(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut not_before = self.not_before.write().await;
        match *not_before {
            Some(existing) if existing >= until => {}
            _ => *not_before = Some(until),
        }
    }

    /// Remaining wait, if the gate is closed.
    pub async fn remaining(&self) -> Option<Duration> {
        let not_before = self.not_before.read().await;
        not_before.and_then(|until| {
            let now = Instant::now();
            (until > now).then(|| until - now)
        })
    }

    /// Wait until the gate opens.
    pub async fn wait(&self) {
        // Fast path: check read lock first
        let Some(delay) = self.remaining().await else {
            return;
        };

        debug!(delay_ms = delay.as_millis() as u64, "Waiting for Bunny rate limit window");
        tokio::time::sleep(delay).await;

        // Clear the deadline unless a later 429 pushed it further out
        let mut not_before = self.not_before.write().await;
        if let Some(until) = *not_before {
            if until <= Instant::now() {
                *not_before = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_gate_has_no_wait() {
        let gate = RateLimitGate::new();
        assert!(gate.remaining().await.is_none());
        gate.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_defer_closes_gate() {
        let gate = RateLimitGate::new();
        gate.defer(Duration::from_secs(5)).await;

        let remaining = gate.remaining().await.unwrap();
        assert!(remaining <= Duration::from_secs(5));
        assert!(remaining > Duration::from_secs(4));

        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(gate.remaining().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_defer_does_not_shrink_wait() {
        let gate = RateLimitGate::new();
        gate.defer(Duration::from_secs(10)).await;
        gate.defer(Duration::from_secs(1)).await;

        assert!(gate.remaining().await.unwrap() > Duration::from_secs(9));
    }
}
