use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Hit/miss counters for the query cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct Inner {
    entries: LruCache<(String, String), Vec<f32>>,
    stats: CacheStats,
}

/// Thread-safe LRU cache for query embeddings
///
/// Keys are `(model, query)` so switching embedding models never serves a
/// vector from the wrong space.
pub struct EmbeddingCache {
    inner: Mutex<Inner>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` embeddings (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(cap),
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, model: &str, query: &str) -> Option<Vec<f32>> {
        let mut inner = self.lock();
        let found = inner
            .entries
            .get(&(model.to_string(), query.to_string()))
            .cloned();
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    pub fn put(&self, model: &str, query: &str, embedding: Vec<f32>) {
        self.lock()
            .entries
            .put((model.to_string(), query.to_string()), embedding);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats = CacheStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_and_stats() {
        let cache = EmbeddingCache::new(10);
        assert!(cache.get("m", "what is AI").is_none());

        cache.put("m", "what is AI", vec![1.0, 2.0]);
        assert_eq!(cache.get("m", "what is AI"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_keys_are_scoped_by_model() {
        let cache = EmbeddingCache::new(10);
        cache.put("model-a", "query", vec![1.0]);
        assert!(cache.get("model-b", "query").is_none());
        assert!(cache.get("model-a", "query").is_some());
    }

    #[test]
    fn test_lru_eviction_respects_recent_use() {
        let cache = EmbeddingCache::new(2);
        cache.put("m", "q1", vec![1.0]);
        cache.put("m", "q2", vec![2.0]);

        // Touch q1 so q2 becomes least recently used
        let _ = cache.get("m", "q1");
        cache.put("m", "q3", vec![3.0]);

        assert!(cache.get("m", "q1").is_some());
        assert!(cache.get("m", "q2").is_none());
        assert!(cache.get("m", "q3").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = EmbeddingCache::new(0);
        cache.put("m", "q1", vec![1.0]);
        cache.put("m", "q2", vec![2.0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_resets_entries_and_stats() {
        let cache = EmbeddingCache::new(4);
        cache.put("m", "q", vec![1.0]);
        let _ = cache.get("m", "q");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
