//! Parsed documents keyed by the SHA-256 of their text.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use pdx_parse::Ast;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Longest a caller waits for the cache lock before treating the lookup as a miss.
const LOCK_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(text: &str) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&Sha256::digest(text.as_bytes()));
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Bounded LRU of parsed documents. Identical text never parses twice while
/// its entry is resident.
pub struct AstCache {
    entries: Mutex<LruCache<ContentHash, Arc<Ast>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AstCache {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<Ast>> {
        let found = match self.entries.try_lock_for(LOCK_TIMEOUT) {
            Some(mut entries) => entries.get(hash).cloned(),
            None => {
                debug!(%hash, "ast cache busy; treating as miss");
                None
            }
        };
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, hash: ContentHash, ast: Arc<Ast>) {
        match self.entries.try_lock_for(LOCK_TIMEOUT) {
            Some(mut entries) => {
                if let Some((evicted, _)) = entries.push(hash, ast)
                    && evicted != hash
                {
                    debug!(%evicted, "evicted ast");
                }
            }
            None => debug!(%hash, "ast cache busy; not caching"),
        }
    }

    /// Look `text` up, parsing and caching it on a miss. The engine splits
    /// this into [`AstCache::get`] and a later [`AstCache::insert`] so that
    /// only the scheduler task writes.
    #[cfg(test)]
    fn get_or_parse(&self, text: &str) -> (ContentHash, Arc<Ast>) {
        let hash = ContentHash::of(text);
        if let Some(ast) = self.get(&hash) {
            return (hash, ast);
        }
        let ast = Arc::new(pdx_parse::parse(text));
        self.insert(hash, Arc::clone(&ast));
        (hash, ast)
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: entries.len(),
            capacity: entries.cap().get(),
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl fmt::Debug for AstCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstCache").field("stats", &self.stats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            ContentHash::of("").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(ContentHash::of("a = 1"), ContentHash::of("a = 2"));
    }

    #[test]
    fn test_reverting_text_reuses_ast() {
        let cache = AstCache::new(4);
        let (_, first) = cache.get_or_parse("a = { b = 1 }");
        let (_, _) = cache.get_or_parse("a = { b = 2 }");
        let (_, again) = cache.get_or_parse("a = { b = 1 }");

        assert!(Arc::ptr_eq(&first, &again));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 2, 2));
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = AstCache::new(2);
        let (a, _) = cache.get_or_parse("a = 1");
        let (b, _) = cache.get_or_parse("b = 1");
        assert!(cache.get(&a).is_some());
        let (c, _) = cache.get_or_parse("c = 1");

        assert!(cache.get(&b).is_none());
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&c).is_some());
        assert_eq!(cache.stats().len, 2);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = AstCache::new(0);
        cache.get_or_parse("a = 1");
        assert_eq!(cache.stats().capacity, 1);
        assert_eq!(cache.stats().len, 1);
    }
}
