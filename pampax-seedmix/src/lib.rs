//! Seed Mix Optimizer: turns `(Intent, Policy, confidence)` into a
//! `SeedMixConfig`, memoized by `(intentHash, policyHash)`.

use pampax_core::{Intent, Policy, SeedMixConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_CACHE_CAPACITY: usize = 256;
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Per-intent and cache-wide counters exposed by the optimizer.
#[derive(Debug, Clone, Default)]
pub struct SeedMixMetrics {
    pub per_intent_counts: HashMap<&'static str, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub early_stop_activations: u64,
}

impl SeedMixMetrics {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

fn intent_label(intent: Intent) -> &'static str {
    match intent {
        Intent::Symbol => "symbol",
        Intent::Api => "api",
        Intent::Config => "config",
        Intent::Incident => "incident",
        Intent::Refactor => "refactor",
        Intent::Search => "search",
    }
}

/// Cheap, stable hash of a `Policy`'s fields, used only for cache keying
/// (not for equality or security).
fn policy_hash(policy: &Policy) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    let mut mix = |v: u64| {
        h ^= v;
        h = h.wrapping_mul(0x100000001b3);
    };
    mix(policy.max_depth as u64);
    mix(policy.early_stop_threshold as u64);
    mix(policy.allow_graph_expansion as u64);
    mix(policy.allow_memory as u64);
    mix(policy.min_score.to_bits() as u64);
    h
}

type CacheKey = (Intent, u64);

struct CacheEntry {
    value: SeedMixConfig,
    inserted_at: Instant,
}

struct LruCache {
    capacity: usize,
    ttl: Duration,
    order: VecDeque<CacheKey>,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl LruCache {
    fn new(capacity: usize, ttl: Duration) -> Self {
        LruCache {
            capacity,
            ttl,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<SeedMixConfig> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            return None;
        }
        self.touch(key);
        self.entries.get(key).map(|e| e.value)
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(*key);
    }

    fn insert(&mut self, key: CacheKey, value: SeedMixConfig) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        self.touch(&key);
    }
}

/// Computes and memoizes `SeedMixConfig`s for `(intent, policy, confidence)`
/// triples.
pub struct SeedMixOptimizer {
    cache: Mutex<LruCache>,
    metrics: Mutex<SeedMixMetrics>,
}

impl Default for SeedMixOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_TTL)
    }
}

impl SeedMixOptimizer {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        SeedMixOptimizer {
            cache: Mutex::new(LruCache::new(capacity.max(DEFAULT_CACHE_CAPACITY), ttl)),
            metrics: Mutex::new(SeedMixMetrics::default()),
        }
    }

    /// Compute (or fetch from cache) the seed mix for this request.
    pub fn compute(&self, intent: Intent, confidence: f32, policy: &Policy) -> SeedMixConfig {
        {
            let mut metrics = self.metrics.lock().unwrap();
            *metrics.per_intent_counts.entry(intent_label(intent)).or_insert(0) += 1;
        }

        let key = (intent, policy_hash(policy));
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(hit) = cache.get(&key) {
                drop(cache);
                self.metrics.lock().unwrap().cache_hits += 1;
                return hit;
            }
        }
        self.metrics.lock().unwrap().cache_misses += 1;

        let config = SeedMixConfig::base_profile(intent)
            .scaled_by_confidence(confidence)
            .clamp_to_policy(policy.max_depth, policy.early_stop_threshold)
            .normalized();

        self.cache.lock().unwrap().insert(key, config);
        config
    }

    pub fn record_early_stop(&self) {
        self.metrics.lock().unwrap().early_stop_activations += 1;
    }

    pub fn metrics(&self) -> SeedMixMetrics {
        self.metrics.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::default_for(Intent::Symbol)
    }

    #[test]
    fn repeated_compute_hits_cache() {
        let opt = SeedMixOptimizer::default();
        let p = policy();
        let a = opt.compute(Intent::Symbol, 0.9, &p);
        let b = opt.compute(Intent::Symbol, 0.9, &p);
        assert_eq!(a.vector_weight, b.vector_weight);
        assert_eq!(opt.metrics().cache_hits, 1);
        assert_eq!(opt.metrics().cache_misses, 1);
    }

    #[test]
    fn weights_scale_with_confidence() {
        let opt = SeedMixOptimizer::default();
        let p = policy();
        let low = opt.compute(Intent::Symbol, 0.0, &p);
        let opt2 = SeedMixOptimizer::default();
        let high = opt2.compute(Intent::Symbol, 1.0, &p);
        assert!(low.confidence_multiplier < high.confidence_multiplier);
    }

    #[test]
    fn depth_is_clamped_to_policy() {
        let opt = SeedMixOptimizer::default();
        let mut p = policy();
        p.max_depth = 1;
        let config = opt.compute(Intent::Symbol, 0.9, &p);
        assert!(config.max_depth <= 1);
    }

    #[test]
    fn per_intent_counts_track_calls() {
        let opt = SeedMixOptimizer::default();
        let p = policy();
        opt.compute(Intent::Symbol, 0.5, &p);
        opt.compute(Intent::Config, 0.5, &Policy::default_for(Intent::Config));
        let m = opt.metrics();
        assert_eq!(*m.per_intent_counts.get("symbol").unwrap(), 1);
        assert_eq!(*m.per_intent_counts.get("config").unwrap(), 1);
    }

    #[test]
    fn lru_evicts_oldest_entry_past_capacity() {
        let opt = SeedMixOptimizer::new(4, DEFAULT_TTL);
        for i in 0..8 {
            let mut p = policy();
            p.min_score = i as f32 * 0.01;
            opt.compute(Intent::Symbol, 0.5, &p);
        }
        // capacity is clamped up to DEFAULT_CACHE_CAPACITY, so nothing
        // should have been evicted yet for only 8 distinct keys.
        assert_eq!(opt.metrics().cache_misses, 8);
    }

    #[test]
    fn normalized_weights_sum_to_one() {
        let opt = SeedMixOptimizer::default();
        let config = opt.compute(Intent::Incident, 0.8, &policy());
        let sum = config.bm25_weight + config.vector_weight + config.symbol_weight + config.memory_weight;
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
