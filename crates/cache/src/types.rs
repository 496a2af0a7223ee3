//! Cache classes, entries and configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Content class a cached payload belongs to. Each class has its own key
/// prefix and TTL policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheClass {
    /// Generated article content
    GeneratedContent,
    /// Trending-topic snapshots
    TrendingTopics,
    /// Knowledge index search results
    SearchResults,
    /// Finished articles
    Article,
    /// Collector source state
    Source,
    /// Quality assessments
    Quality,
    General,
}

impl CacheClass {
    pub const ALL: [CacheClass; 7] = [
        CacheClass::GeneratedContent,
        CacheClass::TrendingTopics,
        CacheClass::SearchResults,
        CacheClass::Article,
        CacheClass::Source,
        CacheClass::Quality,
        CacheClass::General,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::GeneratedContent => "ai:content:",
            Self::TrendingTopics => "trends:",
            Self::SearchResults => "search:",
            Self::Article => "article:",
            Self::Source => "source:",
            Self::Quality => "quality:",
            Self::General => "general:",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeneratedContent => "generated_content",
            Self::TrendingTopics => "trending_topics",
            Self::SearchResults => "search_results",
            Self::Article => "article",
            Self::Source => "source",
            Self::Quality => "quality",
            Self::General => "general",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Which cache layer an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Process-local, bounded
    Hot,
    /// Larger store shared between processes
    Shared,
}

/// How the hot tier picks a victim when it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the entry with the oldest `created_at`.
    #[default]
    OldestCreated,
    /// Evict the entry read or written least recently.
    LeastRecentlyUsed,
}

/// A stored payload with its lifetime bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, payload: Vec<u8>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            payload,
            created_at: now,
            expires_at: expiry(now, ttl),
            hit_count: 0,
            last_accessed: now,
        }
    }

    /// Live while `now < expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Hot and shared TTL for one content class, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTtl {
    pub hot_secs: u64,
    pub shared_secs: u64,
}

impl TierTtl {
    pub const fn new(hot_secs: u64, shared_secs: u64) -> Self {
        Self {
            hot_secs,
            shared_secs,
        }
    }

    pub fn for_tier(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Hot => Duration::from_secs(self.hot_secs),
            Tier::Shared => Duration::from_secs(self.shared_secs),
        }
    }
}

/// Configuration for the cache manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries in the hot tier
    #[serde(default = "default_hot_capacity")]
    pub hot_capacity: usize,

    /// Maximum entries in the in-process shared backend
    #[serde(default = "default_shared_capacity")]
    pub shared_capacity: usize,

    #[serde(default)]
    pub eviction: EvictionPolicy,

    #[serde(default = "default_generated_content_ttl")]
    pub generated_content_ttl: TierTtl,

    #[serde(default = "default_trending_ttl")]
    pub trending_topics_ttl: TierTtl,

    #[serde(default = "default_search_ttl")]
    pub search_results_ttl: TierTtl,

    /// TTL for every other class
    #[serde(default = "default_ttl")]
    pub default_ttl: TierTtl,
}

fn default_hot_capacity() -> usize {
    1000
}

fn default_shared_capacity() -> usize {
    10_000
}

fn default_generated_content_ttl() -> TierTtl {
    TierTtl::new(30 * 60, 7 * 24 * 3600)
}

fn default_trending_ttl() -> TierTtl {
    TierTtl::new(30 * 60, 6 * 3600)
}

fn default_search_ttl() -> TierTtl {
    TierTtl::new(10 * 60, 3600)
}

fn default_ttl() -> TierTtl {
    TierTtl::new(5 * 60, 3600)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_capacity: default_hot_capacity(),
            shared_capacity: default_shared_capacity(),
            eviction: EvictionPolicy::default(),
            generated_content_ttl: default_generated_content_ttl(),
            trending_topics_ttl: default_trending_ttl(),
            search_results_ttl: default_search_ttl(),
            default_ttl: default_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_policy(&self, class: CacheClass) -> TierTtl {
        match class {
            CacheClass::GeneratedContent => self.generated_content_ttl,
            CacheClass::TrendingTopics => self.trending_topics_ttl,
            CacheClass::SearchResults => self.search_results_ttl,
            _ => self.default_ttl,
        }
    }
}
