//! Process-local hot tier.

use crate::types::{CacheEntry, EvictionPolicy};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

struct Slot {
    entry: CacheEntry,
    inserted: u64,
    touched: u64,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    tick: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Outcome of a hot-tier read.
#[derive(Debug, Clone, PartialEq)]
pub enum HotRead {
    Hit(Vec<u8>),
    /// Present but expired; the entry has been purged.
    Expired,
    Missing,
}

/// Bounded in-memory tier with lazy TTL checks.
pub struct HotTier {
    capacity: usize,
    policy: EvictionPolicy,
    inner: Mutex<Inner>,
}

impl HotTier {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            capacity: capacity.max(1),
            policy,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> HotRead {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        let Some(slot) = inner.slots.get_mut(key) else {
            return HotRead::Missing;
        };
        if !slot.entry.is_live(now) {
            inner.slots.remove(key);
            debug!(key = %key, "Purged expired hot entry");
            return HotRead::Expired;
        }
        slot.entry.hit_count += 1;
        slot.entry.last_accessed = now;
        slot.touched = tick;
        HotRead::Hit(slot.entry.payload.clone())
    }

    /// Insert or overwrite an entry. Returns the key evicted to make room,
    /// if any.
    pub fn insert(&self, entry: CacheEntry) -> Option<String> {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();

        let evicted = if !inner.slots.contains_key(&entry.key) && inner.slots.len() >= self.capacity
        {
            let victim = self.pick_victim(&inner);
            if let Some(victim) = &victim {
                inner.slots.remove(victim);
                debug!(key = %victim, policy = ?self.policy, "Evicted from hot tier");
            }
            victim
        } else {
            None
        };

        inner.slots.insert(
            entry.key.clone(),
            Slot {
                entry,
                inserted: tick,
                touched: tick,
            },
        );
        evicted
    }

    fn pick_victim(&self, inner: &Inner) -> Option<String> {
        let slots = inner.slots.iter();
        let victim = match self.policy {
            EvictionPolicy::OldestCreated => {
                slots.min_by_key(|(_, s)| (s.entry.created_at, s.inserted))
            }
            EvictionPolicy::LeastRecentlyUsed => slots.min_by_key(|(_, s)| s.touched),
        };
        victim.map(|(key, _)| key.clone())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().slots.remove(key).is_some()
    }

    /// Remove every key matching `pattern`, returning how many went.
    pub fn remove_matching(&self, pattern: &Regex) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.slots.len();
        inner.slots.retain(|key, _| !pattern.is_match(key));
        before - inner.slots.len()
    }

    /// Remaining lifetime of a live entry.
    pub fn remaining(&self, key: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.inner
            .lock()
            .slots
            .get(key)
            .filter(|s| s.entry.is_live(now))
            .map(|s| s.entry.remaining(now))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().slots.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, now: DateTime<Utc>, ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(key, key.as_bytes().to_vec(), now, Duration::from_secs(ttl_secs))
    }

    #[test]
    fn ttl_boundary_both_sides() {
        let tier = HotTier::new(10, EvictionPolicy::OldestCreated);
        let t0 = Utc::now();
        tier.insert(entry("a", t0, 60));

        let just_before = t0 + chrono::Duration::seconds(60) - chrono::Duration::milliseconds(1);
        assert_eq!(tier.get("a", just_before), HotRead::Hit(b"a".to_vec()));

        let at = t0 + chrono::Duration::seconds(60);
        assert_eq!(tier.get("a", at), HotRead::Expired);
        assert!(!tier.contains("a"));
        assert_eq!(tier.get("a", at), HotRead::Missing);
    }

    #[test]
    fn eviction_keeps_capacity_and_drops_oldest() {
        let capacity = 4;
        let tier = HotTier::new(capacity, EvictionPolicy::OldestCreated);
        let t0 = Utc::now();
        for i in 0..capacity {
            tier.insert(entry(&format!("k{i}"), t0 + chrono::Duration::seconds(i as i64), 600));
        }

        let evicted = tier.insert(entry("new", t0 + chrono::Duration::seconds(10), 600));
        assert_eq!(evicted.as_deref(), Some("k0"));
        assert_eq!(tier.len(), capacity);
        assert!(!tier.contains("k0"));
        assert!(tier.contains("new"));
    }

    #[test]
    fn same_timestamp_evicts_first_inserted() {
        let tier = HotTier::new(2, EvictionPolicy::OldestCreated);
        let t0 = Utc::now();
        tier.insert(entry("first", t0, 600));
        tier.insert(entry("second", t0, 600));
        assert_eq!(tier.insert(entry("third", t0, 600)).as_deref(), Some("first"));
    }

    #[test]
    fn overwrite_does_not_evict() {
        let tier = HotTier::new(2, EvictionPolicy::OldestCreated);
        let t0 = Utc::now();
        tier.insert(entry("a", t0, 600));
        tier.insert(entry("b", t0, 600));
        assert_eq!(tier.insert(entry("a", t0, 600)), None);
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn oldest_created_ignores_reads() {
        let tier = HotTier::new(2, EvictionPolicy::OldestCreated);
        let t0 = Utc::now();
        tier.insert(entry("old", t0, 600));
        tier.insert(entry("young", t0 + chrono::Duration::seconds(1), 600));
        let _ = tier.get("old", t0 + chrono::Duration::seconds(2));
        assert_eq!(
            tier.insert(entry("newest", t0 + chrono::Duration::seconds(3), 600)).as_deref(),
            Some("old")
        );
    }

    #[test]
    fn lru_keeps_recently_read_entries() {
        let tier = HotTier::new(2, EvictionPolicy::LeastRecentlyUsed);
        let t0 = Utc::now();
        tier.insert(entry("old", t0, 600));
        tier.insert(entry("young", t0 + chrono::Duration::seconds(1), 600));
        let _ = tier.get("old", t0 + chrono::Duration::seconds(2));
        assert_eq!(
            tier.insert(entry("newest", t0 + chrono::Duration::seconds(3), 600)).as_deref(),
            Some("young")
        );
    }

    #[test]
    fn remove_matching_counts() {
        let tier = HotTier::new(10, EvictionPolicy::OldestCreated);
        let t0 = Utc::now();
        for key in ["search:a", "search:b", "trends:a"] {
            tier.insert(entry(key, t0, 600));
        }
        let re = Regex::new("^search:.*$").unwrap();
        assert_eq!(tier.remove_matching(&re), 2);
        assert_eq!(tier.len(), 1);
    }
}
