//! Per-client token bucket guarding the hub's inbound channel (spec §4.2).
//! Built on `governor`'s GCRA limiter, the same engine the corpus reaches
//! for rate limiting via `tower_governor`.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as Governor};
use tokio::sync::RwLock;
use tokio::time::Duration;

const RATE_PER_SEC: u32 = 100;
const BURST: u32 = 200;
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const SWEEP_THRESHOLD: usize = 10_000;

type KeyedLimiter = Governor<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

fn quota() -> Quota {
    Quota::per_second(NonZeroU32::new(RATE_PER_SEC).unwrap())
        .allow_burst(NonZeroU32::new(BURST).unwrap())
}

fn fresh_limiter() -> Arc<KeyedLimiter> {
    Arc::new(Governor::keyed(quota()))
}

/// Shared map from client identifier to token bucket. Entries are created
/// lazily on first use; a background sweep clears the whole map once it
/// grows past `SWEEP_THRESHOLD` (a deliberately simple cold-start reset
/// rather than incremental eviction, per spec §4.2).
pub struct RateLimiterRegistry {
    inner: RwLock<Arc<KeyedLimiter>>,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(fresh_limiter()),
        }
    }

    /// Consulted once per inbound frame. Returns `true` if the frame may
    /// proceed, `false` if it must be dropped.
    pub async fn allow(&self, client_id: &str) -> bool {
        let limiter = self.inner.read().await;
        limiter.check_key(&client_id.to_string()).is_ok()
    }

    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Runs once; clears the map entirely if it has grown past the
    /// threshold. Intended to be driven by a periodic background task.
    pub async fn sweep_once(&self) {
        if self.len().await > SWEEP_THRESHOLD {
            let mut guard = self.inner.write().await;
            *guard = fresh_limiter();
            tracing::info!("rate_limiter_sweep_reset");
        }
    }

    pub async fn run_sweeper(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_within_burst_then_blocks() {
        let reg = RateLimiterRegistry::new();
        let mut allowed = 0;
        let mut blocked = 0;
        for _ in 0..(BURST as usize + 10) {
            if reg.allow("client-a").await {
                allowed += 1;
            } else {
                blocked += 1;
            }
        }
        assert_eq!(allowed, BURST as usize);
        assert!(blocked >= 10);
    }

    #[tokio::test]
    async fn separate_clients_have_separate_buckets() {
        let reg = RateLimiterRegistry::new();
        for _ in 0..BURST {
            assert!(reg.allow("a").await);
        }
        assert!(reg.allow("b").await);
    }

    #[tokio::test]
    async fn sweep_resets_map_once_over_threshold() {
        let reg = RateLimiterRegistry::new();
        for i in 0..(SWEEP_THRESHOLD + 1) {
            reg.allow(&format!("client-{i}")).await;
        }
        assert!(reg.len().await > SWEEP_THRESHOLD);
        reg.sweep_once().await;
        assert_eq!(reg.len().await, 0);
    }
}
