//! Rate Limiting Infrastructure
//!
//! Per-client token buckets held in one mutex-guarded map, with a periodic
//! sweep that forgets clients idle past [`RateLimitConfig::idle_timeout`].
//! State is per process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Steady-state refill rate
    pub requests_per_second: f64,
    /// Bucket capacity
    pub burst: u32,
    pub enabled: bool,
    pub sweep_interval: Duration,
    pub idle_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            burst: 4,
            enabled: true,
            sweep_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(3 * 60),
        }
    }
}

/// Token bucket
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    rate_per_sec: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(rate_per_sec: f64, burst: u32, now: Instant) -> Self {
        let capacity = f64::from(burst);
        Self {
            tokens: capacity,
            capacity,
            rate_per_sec,
            last_update: now,
        }
    }

    /// A rejected call does not consume a token.
    fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Per-client rate limiter registry
///
/// `allow` and the eviction sweep take the same exclusive lock.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    config: RateLimitConfig,
    clients: Mutex<HashMap<String, ClientEntry>>,
}

impl RateLimiterRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientEntry>> {
        // A panic while holding the lock leaves the map structurally valid.
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Charge one request to `identity`, creating its bucket on first sight.
    ///
    /// Returns `false` when the bucket is exhausted.
    pub fn allow(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.lock();

        let entry = clients
            .entry(identity.to_owned())
            .or_insert_with(|| ClientEntry {
                bucket: TokenBucket::new(self.config.requests_per_second, self.config.burst, now),
                last_seen: now,
            });
        entry.last_seen = now;
        entry.bucket.try_consume(now)
    }

    /// Remove every client idle longer than the configured timeout.
    ///
    /// Returns the number of entries removed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;
        let mut clients = self.lock();

        let before = clients.len();
        clients.retain(|_, entry| now.duration_since(entry.last_seen) <= idle_timeout);
        before - clients.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`evict_idle`](Self::evict_idle) every sweep interval until
    /// `shutdown` is cancelled.
    pub fn spawn_eviction(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Rate limiter eviction loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle();
                        if evicted > 0 {
                            tracing::debug!(
                                evicted,
                                remaining = self.len(),
                                "Evicted idle rate limiter entries"
                            );
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(rps: f64, burst: u32) -> RateLimiterRegistry {
        RateLimiterRegistry::new(RateLimitConfig {
            requests_per_second: rps,
            burst,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = registry(2.0, 4);
        for _ in 0..4 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_calls_do_not_drain_bucket() {
        let limiter = registry(2.0, 1);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(!limiter.allow("a"));

        // One refill at 2 rps takes 500ms
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.allow("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_independent() {
        let limiter = registry(1.0, 1);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_burst() {
        let limiter = registry(10.0, 2);
        assert!(limiter.allow("a"));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_resets_state() {
        let limiter = registry(0.001, 2);
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.allow("b"));
        assert_eq!(limiter.evict_idle(), 0);

        tokio::time::advance(Duration::from_secs(3 * 60 + 1)).await;
        assert_eq!(limiter.evict_idle(), 2);
        assert!(limiter.is_empty());

        // Full burst available again
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_loop() {
        let limiter = Arc::new(registry(2.0, 4));
        let shutdown = CancellationToken::new();
        let handle = limiter.clone().spawn_eviction(shutdown.clone());

        assert!(limiter.allow("a"));
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert!(limiter.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
