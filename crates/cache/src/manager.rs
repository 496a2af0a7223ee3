//! The two-tier cache manager.

use crate::codec::{JsonCodec, TypedCache};
use crate::hot::{HotRead, HotTier};
use crate::key::{make_key, pattern_regex};
use crate::shared::{InMemorySharedBackend, SharedBackend};
use crate::types::{CacheClass, CacheConfig, CacheEntry, TierTtl, Tier};
use parking_lot::Mutex;
use quill_common::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    evictions: u64,
    shared_errors: u64,
}

/// Entries held by one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierUtilization {
    pub entries: usize,
    pub capacity: usize,
    /// `entries / capacity` as a percentage
    pub utilization: f64,
}

impl TierUtilization {
    fn new(entries: usize, capacity: usize) -> Self {
        let utilization = if capacity == 0 {
            0.0
        } else {
            entries as f64 / capacity as f64 * 100.0
        };
        Self {
            entries,
            capacity,
            utilization,
        }
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub shared_errors: u64,
    /// Hits over total reads as a percentage
    pub hit_rate: f64,
    pub hot: TierUtilization,
    /// `None` when the shared backend could not report its size
    pub shared: Option<TierUtilization>,
}

/// Keys removed per tier by a pattern clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub hot: usize,
    pub shared: usize,
}

/// Two-tier cache: a bounded process-local hot tier in front of a shared
/// backend, each with per-class TTL policies.
///
/// Shared-tier failures never reach callers. Reads degrade to a miss and
/// writes report `false`.
pub struct CacheManager {
    config: CacheConfig,
    hot: HotTier,
    shared: Arc<dyn SharedBackend>,
    clock: Arc<dyn Clock>,
    counters: Mutex<Counters>,
}

impl CacheManager {
    /// Create a manager backed by the in-process shared tier.
    pub fn new(config: CacheConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let shared = Arc::new(InMemorySharedBackend::with_clock(
            config.shared_capacity,
            clock.clone(),
        ));
        Self::with_backend(config, shared, clock)
    }

    pub fn with_backend(
        config: CacheConfig,
        shared: Arc<dyn SharedBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            hot: HotTier::new(config.hot_capacity, config.eviction),
            config,
            shared,
            clock,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn ttl_policy(&self, class: CacheClass) -> TierTtl {
        self.config.ttl_policy(class)
    }

    /// A typed JSON view of `class`.
    pub fn typed<T>(&self, class: CacheClass) -> TypedCache<'_, T, JsonCodec>
    where
        JsonCodec: crate::codec::PayloadCodec<T>,
    {
        TypedCache::new(self, class, JsonCodec)
    }

    fn record_hit(&self, hit: bool) {
        let mut counters = self.counters.lock();
        if hit {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
    }

    fn shared_failed(&self, op: &str, key: &str, error: &quill_common::QuillError) {
        self.counters.lock().shared_errors += 1;
        warn!(
            backend = self.shared.name(),
            op = op,
            key = %key,
            error = %error,
            "Shared cache tier unavailable, degrading"
        );
    }

    async fn read_shared(&self, key: &str) -> Option<CacheEntry> {
        match self.shared.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                self.shared_failed("get", key, &e);
                None
            }
        }
    }

    /// Read one tier.
    pub async fn get(&self, class: CacheClass, id: &str, tier: Tier) -> Option<Vec<u8>> {
        let key = make_key(class, id);
        let payload = match tier {
            Tier::Hot => match self.hot.get(&key, self.clock.now()) {
                HotRead::Hit(payload) => Some(payload),
                HotRead::Expired | HotRead::Missing => None,
            },
            Tier::Shared => self.read_shared(&key).await.map(|e| e.payload),
        };
        self.record_hit(payload.is_some());
        payload
    }

    /// Write one tier. `ttl` defaults to the class policy for that tier.
    pub async fn set(
        &self,
        class: CacheClass,
        id: &str,
        payload: Vec<u8>,
        tier: Tier,
        ttl: Option<Duration>,
    ) -> bool {
        let key = make_key(class, id);
        let ttl = ttl.unwrap_or_else(|| self.ttl_policy(class).for_tier(tier));
        let stored = self.store(tier, CacheEntry::new(key, payload, self.clock.now(), ttl)).await;
        if stored {
            self.counters.lock().sets += 1;
        }
        stored
    }

    async fn store(&self, tier: Tier, entry: CacheEntry) -> bool {
        match tier {
            Tier::Hot => {
                if self.hot.insert(entry).is_some() {
                    self.counters.lock().evictions += 1;
                }
                true
            }
            Tier::Shared => {
                let key = entry.key.clone();
                match self.shared.set(entry).await {
                    Ok(()) => true,
                    Err(e) => {
                        self.shared_failed("set", &key, &e);
                        false
                    }
                }
            }
        }
    }

    /// Read hot first, then shared. A shared hit is promoted into hot with
    /// the class hot TTL, capped at the shared entry's remaining life.
    pub async fn get_multi_tier(&self, class: CacheClass, id: &str) -> Option<Vec<u8>> {
        let key = make_key(class, id);
        let now = self.clock.now();

        if let HotRead::Hit(payload) = self.hot.get(&key, now) {
            self.record_hit(true);
            return Some(payload);
        }

        let Some(entry) = self.read_shared(&key).await else {
            self.record_hit(false);
            return None;
        };
        self.record_hit(true);

        let ttl = self
            .ttl_policy(class)
            .for_tier(Tier::Hot)
            .min(entry.remaining(now));
        if !ttl.is_zero() {
            debug!(key = %key, ttl_secs = ttl.as_secs(), "Promoting shared hit into hot tier");
            let promoted = CacheEntry::new(key, entry.payload.clone(), now, ttl);
            self.store(Tier::Hot, promoted).await;
        }
        Some(entry.payload)
    }

    /// Write both tiers with their policy TTLs. Returns `true` only when
    /// both stores succeeded.
    pub async fn set_multi_tier(&self, class: CacheClass, id: &str, payload: Vec<u8>) -> bool {
        let hot = self
            .set(class, id, payload.clone(), Tier::Hot, None)
            .await;
        let shared = self.set(class, id, payload, Tier::Shared, None).await;
        hot && shared
    }

    /// Remove from both tiers. Returns whether any tier held the key.
    pub async fn delete(&self, class: CacheClass, id: &str) -> bool {
        let key = make_key(class, id);
        let hot = self.hot.remove(&key);
        let shared = match self.shared.delete(&key).await {
            Ok(removed) => removed,
            Err(e) => {
                self.shared_failed("delete", &key, &e);
                false
            }
        };
        self.counters.lock().deletes += 1;
        hot || shared
    }

    /// Remove every key of `class` whose identifier matches `glob`.
    pub async fn clear_pattern(&self, class: CacheClass, glob: &str) -> ClearReport {
        let pattern = match pattern_regex(class, glob) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(class = class.as_str(), pattern = %glob, error = %e, "Ignoring invalid cache pattern");
                return ClearReport::default();
            }
        };

        let hot = self.hot.remove_matching(&pattern);
        let shared = match self.shared.clear_matching(&pattern).await {
            Ok(count) => count,
            Err(e) => {
                self.shared_failed("clear", glob, &e);
                0
            }
        };

        let report = ClearReport { hot, shared };
        self.counters.lock().deletes += (hot + shared) as u64;
        debug!(class = class.as_str(), pattern = %glob, hot, shared, "Cleared cache pattern");
        report
    }

    /// Clear every class.
    pub async fn clear_all(&self) -> ClearReport {
        let mut total = ClearReport::default();
        for class in CacheClass::ALL {
            let report = self.clear_pattern(class, "*").await;
            total.hot += report.hot;
            total.shared += report.shared;
        }
        total
    }

    pub async fn stats(&self) -> CacheStats {
        let shared = match self.shared.len().await {
            Ok(len) => Some(TierUtilization::new(len, self.shared.capacity())),
            Err(e) => {
                self.shared_failed("len", "*", &e);
                None
            }
        };

        let counters = *self.counters.lock();
        let reads = counters.hits + counters.misses;
        let hit_rate = if reads == 0 {
            0.0
        } else {
            counters.hits as f64 / reads as f64 * 100.0
        };

        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            deletes: counters.deletes,
            evictions: counters.evictions,
            shared_errors: counters.shared_errors,
            hit_rate,
            hot: TierUtilization::new(self.hot.len(), self.hot.capacity()),
            shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use quill_common::{ManualClock, QuillError, Result};
    use regex::Regex;

    struct DownBackend;

    #[async_trait]
    impl SharedBackend for DownBackend {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
            Err(QuillError::CacheBackendUnavailable("connection refused".into()))
        }
        async fn set(&self, _entry: CacheEntry) -> Result<()> {
            Err(QuillError::CacheBackendUnavailable("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(QuillError::CacheBackendUnavailable("connection refused".into()))
        }
        async fn clear_matching(&self, _pattern: &Regex) -> Result<usize> {
            Err(QuillError::CacheBackendUnavailable("connection refused".into()))
        }
        async fn len(&self) -> Result<usize> {
            Err(QuillError::CacheBackendUnavailable("connection refused".into()))
        }
        fn capacity(&self) -> usize {
            0
        }
        fn name(&self) -> &str {
            "down"
        }
    }

    fn manual(config: CacheConfig) -> (CacheManager, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let shared = Arc::new(InMemorySharedBackend::with_clock(
            config.shared_capacity,
            Arc::new(clock.clone()),
        ));
        (
            CacheManager::with_backend(config, shared, Arc::new(clock.clone())),
            clock,
        )
    }

    #[tokio::test]
    async fn ttl_expiry_on_hot_tier() {
        let (cache, clock) = manual(CacheConfig::default());
        let ttl = Duration::from_secs(30);
        assert!(cache.set(CacheClass::General, "k", b"v".to_vec(), Tier::Hot, Some(ttl)).await);

        clock.advance(chrono::Duration::seconds(29));
        assert_eq!(cache.get(CacheClass::General, "k", Tier::Hot).await, Some(b"v".to_vec()));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.get(CacheClass::General, "k", Tier::Hot).await, None);
    }

    #[tokio::test]
    async fn shared_hit_is_promoted_with_capped_ttl() {
        let (cache, clock) = manual(CacheConfig::default());
        // Shared entry has 60s left, below the 30 minute hot policy.
        cache
            .set(
                CacheClass::GeneratedContent,
                "finance_bitcoin:practical_wisdom",
                b"body".to_vec(),
                Tier::Shared,
                Some(Duration::from_secs(60)),
            )
            .await;
        assert_eq!(
            cache.get(CacheClass::GeneratedContent, "finance_bitcoin:practical_wisdom", Tier::Hot).await,
            None
        );

        let got = cache
            .get_multi_tier(CacheClass::GeneratedContent, "finance_bitcoin:practical_wisdom")
            .await;
        assert_eq!(got, Some(b"body".to_vec()));

        let key = make_key(CacheClass::GeneratedContent, "finance_bitcoin:practical_wisdom");
        assert_eq!(cache.hot.remaining(&key, clock.now()), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn promotion_uses_hot_policy_when_shorter() {
        let (cache, clock) = manual(CacheConfig::default());
        cache
            .set(CacheClass::TrendingTopics, "2026-10-18", b"[]".to_vec(), Tier::Shared, None)
            .await;
        cache.get_multi_tier(CacheClass::TrendingTopics, "2026-10-18").await;

        let key = make_key(CacheClass::TrendingTopics, "2026-10-18");
        assert_eq!(cache.hot.remaining(&key, clock.now()), Some(Duration::from_secs(1800)));
    }

    #[tokio::test]
    async fn shared_failures_degrade() {
        let cache = CacheManager::with_backend(
            CacheConfig::default(),
            Arc::new(DownBackend),
            Arc::new(SystemClock),
        );

        assert_eq!(cache.get(CacheClass::General, "k", Tier::Shared).await, None);
        assert!(!cache.set(CacheClass::General, "k", vec![1], Tier::Shared, None).await);
        assert!(!cache.set_multi_tier(CacheClass::General, "k", vec![1]).await);

        // The hot copy still serves reads.
        assert_eq!(cache.get_multi_tier(CacheClass::General, "k").await, Some(vec![1]));
        assert!(cache.delete(CacheClass::General, "k").await);
        assert_eq!(cache.get_multi_tier(CacheClass::General, "k").await, None);

        let report = cache.clear_pattern(CacheClass::General, "*").await;
        assert_eq!(report, ClearReport::default());

        let stats = cache.stats().await;
        assert!(stats.shared.is_none());
        assert!(stats.shared_errors >= 5);
    }

    #[tokio::test]
    async fn clear_pattern_counts_per_tier() {
        let (cache, _clock) = manual(CacheConfig::default());
        cache.set_multi_tier(CacheClass::SearchResults, "finance:bitcoin", vec![1]).await;
        cache.set_multi_tier(CacheClass::SearchResults, "finance:budget", vec![2]).await;
        cache
            .set(CacheClass::SearchResults, "crypto:eth", vec![3], Tier::Shared, None)
            .await;
        cache.set_multi_tier(CacheClass::TrendingTopics, "finance:x", vec![4]).await;

        let report = cache.clear_pattern(CacheClass::SearchResults, "finance:*").await;
        assert_eq!(report, ClearReport { hot: 2, shared: 2 });

        let everything = cache.clear_pattern(CacheClass::SearchResults, "*").await;
        assert_eq!(everything, ClearReport { hot: 0, shared: 1 });
        assert!(cache.get_multi_tier(CacheClass::TrendingTopics, "finance:x").await.is_some());
    }

    #[tokio::test]
    async fn stats_track_counters() {
        let config = CacheConfig {
            hot_capacity: 2,
            ..Default::default()
        };
        let (cache, _clock) = manual(config);
        for id in ["a", "b", "c"] {
            cache.set(CacheClass::General, id, vec![0], Tier::Hot, None).await;
        }
        cache.get(CacheClass::General, "c", Tier::Hot).await;
        cache.get(CacheClass::General, "a", Tier::Hot).await;

        let stats = cache.stats().await;
        assert_eq!(stats.sets, 3);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 50.0).abs() < 1e-9);
        assert_eq!(stats.hot.entries, 2);
        assert!((stats.hot.utilization - 100.0).abs() < 1e-9);
    }
}
