//! Cache of parsed raw expressions

use crate::rule::Check;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

/// Parsed trees for expressions enforced without being registered
///
/// Separate from the rule registry, which stays immutable. Once
/// `max_size` entries are held, new expressions are parsed on every call.
pub struct ExpressionCache {
    entries: DashMap<String, Arc<Check>>,
    max_size: usize,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl ExpressionCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    pub fn get(&self, expression: &str) -> Option<Arc<Check>> {
        match self.entries.get(expression) {
            Some(entry) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, expression: &str, check: Arc<Check>) {
        if self.entries.len() >= self.max_size {
            return;
        }
        self.entries.insert(expression.to_string(), check);
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.hit_count.store(0, Ordering::Relaxed);
        self.miss_count.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hit_count.load(Ordering::Relaxed);
        let misses = self.miss_count.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            size: self.entries.len(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss_counts() {
        let cache = ExpressionCache::new(10);
        assert!(cache.get("role:a").is_none());

        cache.insert("role:a", Arc::new(Check::Role("a".to_string())));
        assert!(cache.get("role:a").is_some());

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_capacity_bound() {
        let cache = ExpressionCache::new(1);
        cache.insert("role:a", Arc::new(Check::True));
        cache.insert("role:b", Arc::new(Check::True));
        assert_eq!(cache.stats().size, 1);
        assert!(cache.get("role:b").is_none());
    }

    #[test]
    fn test_clear_resets() {
        let cache = ExpressionCache::new(10);
        cache.insert("role:a", Arc::new(Check::True));
        cache.get("role:a");
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hit_count, 0);
    }
}
