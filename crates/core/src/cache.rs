//! Generic bounded TTL cache.
//!
//! Each service component owns its cache instances as plain fields (no
//! module-level globals) so tests get isolated instances and teardown is
//! just `drop`. The cache is not internally synchronized; callers wrap it
//! in a `Mutex` when shared across tasks.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
    last_access: u64,
}

/// A bounded key-value cache with per-entry TTL and LRU eviction at capacity.
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    default_ttl: Duration,
    access_counter: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Create a cache holding at most `capacity` live entries, each expiring
    /// `default_ttl` after insertion.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            default_ttl,
            access_counter: 0,
        }
    }

    /// Look up a key, returning a clone of the value if present and fresh.
    /// Expired entries are removed on access.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                self.access_counter += 1;
                entry.last_access = self.access_counter;
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert with the default TTL, evicting the least recently used entry
    /// if the cache is at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL.
    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.purge_expired();
            if self.entries.len() >= self.capacity {
                self.evict_lru();
            }
        }
        self.access_counter += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
                last_access: self.access_counter,
            },
        );
    }

    /// Remove a single key. Returns `true` if an entry was present.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose key matches the predicate. Returns the
    /// number of entries removed.
    pub fn invalidate_matching(&mut self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !pred(k));
        before - self.entries.len()
    }

    /// Drop all expired entries. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before - self.entries.len()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries currently held (including any not-yet-purged
    /// expired entries).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_lru(&mut self) {
        if let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_inserted_value() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a".into(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn missing_key_returns_none() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(4, Duration::from_secs(60));
        assert_eq!(cache.get(&"nope".to_string()), None);
    }

    #[test]
    fn expired_entry_is_gone() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(4, Duration::from_secs(60));
        cache.insert_with_ttl("a".into(), 1, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let mut cache: TtlCache<&'static str, i32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        // Touch "a" so "b" becomes the LRU entry.
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn reinserting_existing_key_does_not_evict() {
        let mut cache: TtlCache<&'static str, i32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn invalidate_matching_removes_by_predicate() {
        let mut cache: TtlCache<(i64, i64), i32> = TtlCache::new(8, Duration::from_secs(60));
        cache.insert((1, 2), 0);
        cache.insert((1, 3), 0);
        cache.insert((4, 5), 0);
        let removed = cache.invalidate_matching(|(a, _)| *a == 1);
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn purge_expired_counts_removals() {
        let mut cache: TtlCache<&'static str, i32> = TtlCache::new(8, Duration::from_secs(60));
        cache.insert_with_ttl("a", 1, Duration::from_millis(5));
        cache.insert("b", 2);
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
