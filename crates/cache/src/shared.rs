//! Shared tier backends.

use crate::types::CacheEntry;
use async_trait::async_trait;
use quill_common::{Clock, Result, SystemClock};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A key/value store with TTL support shared between processes.
///
/// Implementations report unavailability as
/// [`QuillError::CacheBackendUnavailable`](quill_common::QuillError::CacheBackendUnavailable);
/// the cache manager turns that into a miss.
#[async_trait]
pub trait SharedBackend: Send + Sync {
    /// Fetch a live entry. Expired entries are absent.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    async fn set(&self, entry: CacheEntry) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every key matching `pattern`, returning the count.
    async fn clear_matching(&self, pattern: &Regex) -> Result<usize>;

    async fn len(&self) -> Result<usize>;

    fn capacity(&self) -> usize;

    fn name(&self) -> &str;
}

/// In-process shared backend. Larger and longer-lived than the hot tier,
/// with its own oldest-first eviction.
pub struct InMemorySharedBackend {
    capacity: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySharedBackend {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl SharedBackend for InMemorySharedBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.hit_count += 1;
                entry.last_accessed = now;
                Ok(Some(entry.clone()))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&entry.key) && entries.len() >= self.capacity {
            let oldest = entries
                .values()
                .min_by_key(|e| e.created_at)
                .map(|e| e.key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(key = %oldest, "Evicted from shared tier");
            }
        }
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear_matching(&self, pattern: &Regex) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !pattern.is_match(key));
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
