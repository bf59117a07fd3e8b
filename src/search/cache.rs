//! Bounded response cache with TTL eviction
//!
//! Keyed by normalised query text. DashMap shards give per-key locking;
//! readers and writers on different keys never contend.

use super::types::SearchEnvelope;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    envelope: SearchEnvelope,
    inserted: Instant,
}

/// Query-response cache
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            ttl,
        }
    }

    /// Cache key for a query: trimmed, lowercased, whitespace collapsed.
    pub fn key_for(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }

    /// Fresh cached envelope for a key, if any. Expired entries are
    /// dropped on the way out.
    pub fn get(&self, key: &str) -> Option<SearchEnvelope> {
        let hit = self.entries.get(key)?;
        if hit.inserted.elapsed() > self.ttl {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.envelope.clone())
    }

    /// Insert an envelope, evicting expired entries first and the oldest
    /// entry when still at capacity. A zero capacity disables caching.
    pub fn insert(&self, key: String, envelope: SearchEnvelope) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.retain(|_, entry| entry.inserted.elapsed() <= self.ttl);
        }
        if self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.inserted)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                self.entries.remove(&key);
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                envelope,
                inserted: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn envelope(query: &str) -> SearchEnvelope {
        SearchEnvelope::failed(query, ErrorKind::Internal, "placeholder")
    }

    #[test]
    fn key_normalises_case_and_whitespace() {
        assert_eq!(ResponseCache::key_for("  Alpha   BETA "), "alpha beta");
    }

    #[test]
    fn get_returns_fresh_entries() {
        let cache = ResponseCache::new(4, Duration::from_secs(60));
        cache.insert("alpha".to_string(), envelope("alpha"));
        assert!(cache.get("alpha").is_some());
        assert!(cache.get("beta").is_none());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = ResponseCache::new(4, Duration::from_millis(0));
        cache.insert("alpha".to_string(), envelope("alpha"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("alpha").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), envelope("a"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".to_string(), envelope("b"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".to_string(), envelope("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none(), "oldest entry evicted");
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = ResponseCache::new(0, Duration::from_secs(60));
        cache.insert("a".to_string(), envelope("a"));
        assert!(cache.is_empty());
    }
}
