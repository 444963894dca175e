//! MemoryCache (C7): an in-process LRU in front of the persistent/sidecar
//! tiers, keyed the same way as [`crate::cache::persistent::CacheKey`].

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::cache::persistent::CacheKey;
use crate::models::{Fingerprint, FINGERPRINT_VERSION};

pub const DEFAULT_CAPACITY: usize = 1000;

pub struct MemoryCache {
    inner: Mutex<LruCache<CacheKey, Fingerprint>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { inner: Mutex::new(LruCache::new(cap)) }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Fingerprint> {
        let mut guard = self.inner.lock();
        let fp = guard.get(key)?;
        if fp.fingerprint_version != FINGERPRINT_VERSION {
            guard.pop(key);
            return None;
        }
        Some(fp.clone())
    }

    pub fn put(&self, key: CacheKey, fp: Fingerprint) {
        self.inner.lock().put(key, fp);
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.inner.lock().pop(key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> CacheKey {
        CacheKey { size_bytes: n, mtime_ns: n }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = MemoryCache::new(10);
        let mut fp = Fingerprint { tempo_bpm: 99.0, ..Fingerprint::default() };
        fp.sanitize();
        cache.put(key(1), fp);
        assert_eq!(cache.get(&key(1)).unwrap().tempo_bpm, 99.0);
    }

    #[test]
    fn evicts_least_recently_used_past_capacity() {
        let cache = MemoryCache::new(2);
        let mut fp = Fingerprint::default();
        fp.sanitize();
        cache.put(key(1), fp.clone());
        cache.put(key(2), fp.clone());
        cache.put(key(3), fp.clone());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).is_none());
    }

    #[test]
    fn version_mismatch_is_treated_as_miss() {
        let cache = MemoryCache::new(10);
        let stale = Fingerprint { fingerprint_version: FINGERPRINT_VERSION + 1, ..Fingerprint::default() };
        cache.put(key(1), stale);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());
    }
}
