//! Cache Layer: namespaced, versioned, TTL+LRU caches for search,
//! traversal, and bundle-plan results.

use pampax_core::CacheStats;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Build a cache key from ordered parts plus the Store's `indexVersion`.
/// Changing `index_version` always produces a disjoint key space, so a
/// version bump invalidates every prior entry without an explicit sweep.
fn build_key(parts: &[&str], index_version: &str) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(index_version.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn search_key(query: &str, filters: &str, policy: &str, index_version: &str) -> String {
    build_key(&["search", query, filters, policy], index_version)
}

pub fn traversal_key(seeds: &str, policy: &str, index_version: &str) -> String {
    build_key(&["traversal", seeds, policy], index_version)
}

pub fn bundle_plan_key(query_sig: &str, budget: &str, model: &str, index_version: &str) -> String {
    build_key(&["bundle-plan", query_sig, budget, model], index_version)
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A single namespaced cache: TTL expiry plus LRU eviction at capacity.
pub struct Cache<V: Clone> {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, Entry<V>>,
    order: VecDeque<String>,
    stats: CacheStats,
}

impl<V: Clone> Cache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Cache {
            capacity,
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    /// Read-through `get`: reports a hit only for entries within TTL. A
    /// hit is first-class evidence (`cached = true`) for the caller.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => {
                self.stats.misses += 1;
                return None;
            }
        };
        if expired {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            self.stats.misses += 1;
            return None;
        }
        self.touch(key);
        self.stats.hits += 1;
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Read a value ignoring TTL, counting it as a stale hit. Used when a
    /// caller explicitly opts into best-effort staleness.
    pub fn get_stale(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) => {
                self.touch(key);
                self.stats.stale_served += 1;
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    pub fn put(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        self.touch(&key);
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    /// Pre-populate the cache, e.g. after a reindex, without going
    /// through the normal miss path (operator `warm` operation).
    pub fn warm(&mut self, entries: Vec<(String, V)>) {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    /// Drop every entry (operator `clear` operation).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The namespaced cache used across one assembly run.
///
/// `search_key`/`traversal_key` are kept alongside `bundle_plan_key` as the
/// full namespace this layer is built to address, but only the bundle-plan
/// namespace is wired into the assembler today: a warm bundle-plan hit
/// already short-circuits the whole pipeline, so a partial search- or
/// traversal-level cache would only add bookkeeping without a measurable
/// win. Generic over `B` so the assembler can plug in its own `Bundle`
/// type without this crate depending on it.
pub struct NamespacedCaches<B: Clone> {
    pub bundle_plan: Cache<B>,
}

impl<B: Clone> NamespacedCaches<B> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        NamespacedCaches {
            bundle_plan: Cache::new(capacity, ttl),
        }
    }

    pub fn clear_all(&mut self) {
        self.bundle_plan.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let mut cache: Cache<i32> = Cache::new(16, Duration::from_secs(60));
        let key = search_key("q", "f", "p", "v1");
        assert_eq!(cache.get(&key), None);
        cache.put(key.clone(), 42);
        assert_eq!(cache.get(&key), Some(42));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn index_version_change_invalidates_key_space() {
        let key_v1 = search_key("q", "f", "p", "v1");
        let key_v2 = search_key("q", "f", "p", "v2");
        assert_ne!(key_v1, key_v2);

        let mut cache: Cache<i32> = Cache::new(16, Duration::from_secs(60));
        cache.put(key_v1, 1);
        assert_eq!(cache.get(&key_v2), None);
    }

    #[test]
    fn ttl_expiry_counts_as_miss() {
        let mut cache: Cache<i32> = Cache::new(16, Duration::from_millis(1));
        let key = search_key("q", "f", "p", "v1");
        cache.put(key.clone(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn lru_evicts_oldest_at_capacity() {
        let mut cache: Cache<i32> = Cache::new(2, Duration::from_secs(60));
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.put("c".into(), 3); // evicts "a"
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache: Cache<i32> = Cache::new(16, Duration::from_secs(60));
        cache.put("a".into(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn warm_populates_without_counting_as_miss_path() {
        let mut cache: Cache<i32> = Cache::new(16, Duration::from_secs(60));
        cache.warm(vec![("a".into(), 1), ("b".into(), 2)]);
        assert_eq!(cache.len(), 2);
    }
}
