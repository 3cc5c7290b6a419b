//! Size-bounded TTL map shared by the score cache and the semantic intent cache.
//!
//! Eviction on a full insert: drop every expired entry; if nothing had expired, drop the
//! oldest `eviction_fraction` of entries by insertion time (at least one). Writes re-stamp
//! the entry; reads never touch it. Every operation has an `_at(now)` form so the policy
//! can be tested without sleeping.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::debug;

/// One cached value with its write time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

#[derive(Debug)]
pub struct BoundedCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    max_entries: usize,
    ttl: Duration,
    eviction_fraction: f64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize, ttl: Duration, eviction_fraction: f64) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            ttl,
            eviction_fraction: eviction_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict(now);
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                ttl: self.ttl,
            },
        );
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Make room for one insertion. Returns the number of entries dropped.
    fn evict(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let expired = before - self.entries.len();
        if expired > 0 {
            debug!(target: "hearth::cache", expired, "evicted expired entries");
            return expired;
        }

        let share = (self.entries.len() as f64 * self.eviction_fraction).round() as usize;
        let n = share.clamp(1, self.entries.len().max(1));
        let mut by_age: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.inserted_at))
            .collect();
        by_age.sort_by_key(|(_, at)| *at);
        for (k, _) in by_age.into_iter().take(n) {
            self.entries.remove(&k);
        }
        debug!(target: "hearth::cache", evicted = n, "evicted oldest entries");
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn get_respects_ttl() {
        let t0 = Instant::now();
        let mut cache = BoundedCache::new(10, TTL, 0.2);
        cache.insert_at("a", 1, t0);
        assert_eq!(cache.get_at(&"a", t0 + Duration::from_secs(59)), Some(1));
        assert_eq!(cache.get_at(&"a", t0 + Duration::from_secs(61)), None);
    }

    #[test]
    fn full_cache_drops_expired_first() {
        let t0 = Instant::now();
        let mut cache = BoundedCache::new(3, TTL, 0.2);
        cache.insert_at("old", 0, t0);
        cache.insert_at("b", 1, t0 + Duration::from_secs(50));
        cache.insert_at("c", 2, t0 + Duration::from_secs(55));

        // "old" has expired by now; only it should go.
        let now = t0 + Duration::from_secs(70);
        cache.insert_at("d", 3, now);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get_at(&"old", now), None);
        assert_eq!(cache.get_at(&"b", now), Some(1));
        assert_eq!(cache.get_at(&"d", now), Some(3));
    }

    #[test]
    fn full_cache_without_expiry_drops_oldest_fifth() {
        let t0 = Instant::now();
        let mut cache = BoundedCache::new(10, TTL, 0.2);
        for i in 0..10u64 {
            cache.insert_at(i, i, t0 + Duration::from_millis(i));
        }
        let now = t0 + Duration::from_secs(1);
        cache.insert_at(100, 100, now);

        // 20% of 10 = 2 oldest removed, then one inserted.
        assert_eq!(cache.len(), 9);
        assert_eq!(cache.get_at(&0, now), None);
        assert_eq!(cache.get_at(&1, now), None);
        assert_eq!(cache.get_at(&2, now), Some(2));
        assert_eq!(cache.get_at(&100, now), Some(100));
    }

    #[test]
    fn never_exceeds_max_size() {
        let t0 = Instant::now();
        for max in [1usize, 2, 3, 7, 50] {
            let mut cache = BoundedCache::new(max, TTL, 0.2);
            for i in 0..(max * 4) {
                cache.insert_at(i, i, t0 + Duration::from_millis(i as u64));
                assert!(cache.len() <= max, "len {} > max {}", cache.len(), max);
            }
        }
    }

    #[test]
    fn overwrite_restamps_without_evicting() {
        let t0 = Instant::now();
        let mut cache = BoundedCache::new(2, TTL, 0.2);
        cache.insert_at("a", 1, t0);
        cache.insert_at("b", 2, t0);
        cache.insert_at("a", 3, t0 + Duration::from_secs(50));
        assert_eq!(cache.len(), 2);
        // "b" expires, "a" was re-stamped and survives.
        let later = t0 + Duration::from_secs(100);
        assert_eq!(cache.get_at(&"a", later), Some(3));
        assert_eq!(cache.get_at(&"b", later), None);
    }

    #[test]
    fn reads_do_not_refresh_age() {
        let t0 = Instant::now();
        let mut cache = BoundedCache::new(2, TTL, 0.5);
        cache.insert_at("a", 1, t0);
        cache.insert_at("b", 2, t0 + Duration::from_secs(1));
        // Reading "a" must not protect it from oldest-first eviction.
        assert_eq!(cache.get_at(&"a", t0 + Duration::from_secs(2)), Some(1));
        cache.insert_at("c", 3, t0 + Duration::from_secs(3));
        assert_eq!(cache.get_at(&"a", t0 + Duration::from_secs(3)), None);
        assert_eq!(cache.get_at(&"b", t0 + Duration::from_secs(3)), Some(2));
    }
}
