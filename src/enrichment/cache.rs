//! Per-enrichment lookup cache (§4.5 "consult the per-enrichment cache
//! first ... eviction is LRU, TTL = cacheTtlSeconds").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::expr::Value;

struct Entry {
    row: Option<HashMap<String, Value>>,
    inserted_at: Instant,
}

pub struct LookupCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl LookupCache {
    pub fn new(capacity: usize, ttl_seconds: u64) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        LookupCache {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub fn get(&self, key: &str) -> Option<Option<HashMap<String, Value>>> {
        let mut guard = self.inner.lock().expect("lookup cache lock poisoned");
        match guard.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.row.clone()),
            Some(_) => {
                guard.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, row: Option<HashMap<String, Value>>) {
        let mut guard = self.inner.lock().expect("lookup cache lock poisoned");
        guard.put(key, Entry { row, inserted_at: Instant::now() });
    }

    /// Current entry count, including not-yet-expired misses (§2 admin CLI
    /// cache introspection).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lookup cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_entries_past_ttl() {
        let cache = LookupCache::new(10, 0);
        cache.put("k".into(), None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn caches_hits_within_ttl() {
        let cache = LookupCache::new(10, 60);
        let mut row = HashMap::new();
        row.insert("name".to_string(), Value::String("Goldman Sachs".into()));
        cache.put("CPTY001".into(), Some(row.clone()));
        assert_eq!(cache.get("CPTY001"), Some(Some(row)));
    }
}
