//! Per-requester rate limiting
//!
//! Sharded in-memory fixed-window limiter. Each requester gets a bucket; the
//! bucket resets when its window expires. Shards cut lock contention when
//! many requesters arrive at once.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use tunedex_core::models::RequesterId;

#[derive(Clone)]
struct RateLimitBucket {
    count: u32,
    reset_at: Instant,
}

impl RateLimitBucket {
    fn new(window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: Instant::now() + window,
        }
    }

    fn check_and_increment(&mut self, limit: u32, window: Duration) -> (bool, u32) {
        let now = Instant::now();

        // Reset if window expired
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }

        if self.count < limit {
            self.count += 1;
            (true, limit.saturating_sub(self.count))
        } else {
            (false, 0)
        }
    }

    fn reset_in(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }
}

/// Sharded limiter keyed by requester identity.
#[derive(Clone)]
pub struct RequestRateLimiter {
    shards: Vec<Arc<Mutex<HashMap<RequesterId, RateLimitBucket>>>>,
    shard_count: usize,
    limit: u32,
    window: Duration,
    max_buckets: usize,
}

impl RequestRateLimiter {
    /// Create a limiter with the default shard count (16).
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_shards(limit, window, 16)
    }

    pub fn with_shards(limit: u32, window: Duration, shard_count: usize) -> Self {
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            shard_count,
            limit,
            window,
            max_buckets: 10_000,
        }
    }

    fn shard_index(&self, requester: RequesterId) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        requester.hash(&mut hasher);
        (hasher.finish() as usize) % self.shard_count
    }

    /// Charge one request against the requester's window. Returns the
    /// remaining allowance, or the time until the window resets when the
    /// ceiling is hit.
    pub async fn check_and_increment(&self, requester: RequesterId) -> Result<u32, Duration> {
        let shard = &self.shards[self.shard_index(requester)];
        let mut buckets = shard.lock().await;

        // Keep the shard bounded: drop expired buckets first, then the
        // oldest one if still at capacity
        if buckets.len() >= self.max_buckets {
            let now = Instant::now();
            buckets.retain(|_, bucket| bucket.reset_at > now);

            if buckets.len() >= self.max_buckets {
                let oldest = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.reset_at)
                    .map(|(k, _)| *k);
                if let Some(key) = oldest {
                    buckets.remove(&key);
                    tracing::debug!(requester = %key, "Evicted oldest rate limit bucket at capacity");
                }
            }
        }

        let window = self.window;
        let bucket = buckets
            .entry(requester)
            .or_insert_with(|| RateLimitBucket::new(window));

        let (allowed, remaining) = bucket.check_and_increment(self.limit, self.window);
        if allowed {
            Ok(remaining)
        } else {
            Err(bucket.reset_in())
        }
    }

    /// Drop buckets whose window has fully expired. Run periodically from a
    /// background task.
    pub async fn cleanup_expired_buckets(&self) -> usize {
        let now = Instant::now();
        let mut total_cleaned = 0;

        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| bucket.reset_at > now);
            total_cleaned += before - buckets.len();
        }

        if total_cleaned > 0 {
            tracing::debug!(buckets_cleaned = total_cleaned, "Cleaned up expired rate limit buckets");
        }
        total_cleaned
    }

    pub async fn tracked_requesters(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_ceiling() {
        let limiter = RequestRateLimiter::new(3, Duration::from_secs(3600));
        let requester = RequesterId(42);

        assert_eq!(limiter.check_and_increment(requester).await, Ok(2));
        assert_eq!(limiter.check_and_increment(requester).await, Ok(1));
        assert_eq!(limiter.check_and_increment(requester).await, Ok(0));

        let retry_in = limiter.check_and_increment(requester).await.unwrap_err();
        assert!(retry_in <= Duration::from_secs(3600));
        assert!(retry_in > Duration::from_secs(3590));
    }

    #[tokio::test]
    async fn requesters_are_independent() {
        let limiter = RequestRateLimiter::new(1, Duration::from_secs(3600));

        assert!(limiter.check_and_increment(RequesterId(1)).await.is_ok());
        assert!(limiter.check_and_increment(RequesterId(1)).await.is_err());
        assert!(limiter.check_and_increment(RequesterId(2)).await.is_ok());
    }

    #[tokio::test]
    async fn window_rollover_resets_the_count() {
        let limiter = RequestRateLimiter::new(1, Duration::from_millis(30));
        let requester = RequesterId(7);

        assert!(limiter.check_and_increment(requester).await.is_ok());
        assert!(limiter.check_and_increment(requester).await.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(limiter.check_and_increment(requester).await.is_ok());
    }

    #[tokio::test]
    async fn cleanup_drops_expired_buckets() {
        let limiter = RequestRateLimiter::new(5, Duration::from_millis(20));

        for id in 0..10 {
            limiter.check_and_increment(RequesterId(id)).await.ok();
        }
        assert_eq!(limiter.tracked_requesters().await, 10);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(limiter.cleanup_expired_buckets().await, 10);
        assert_eq!(limiter.tracked_requesters().await, 0);
    }
}
