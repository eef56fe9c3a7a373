use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default sliding TTL for cached identity mappings: 24 hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Fast lookup tier mapping `browser_hash` to `user_id`.
///
/// The cache is purely an optimization over the durable store: losing it is
/// always safe, and implementations must never let an internal failure
/// escape to the caller. A `get` hit refreshes the entry's expiry (sliding
/// TTL).
pub trait IdentityCache: Send + Sync {
    /// Looks up the cached identifier for `browser_hash`, refreshing its
    /// TTL on a hit.
    fn get(&self, browser_hash: &str) -> Option<String>;

    /// Stores or replaces the mapping with a fresh TTL.
    fn put(&self, browser_hash: &str, user_id: &str);
}

struct CacheEntry {
    user_id: String,
    expires_at: Instant,
}

/// In-process [`IdentityCache`] with a sliding per-entry TTL.
///
/// Expired entries are dropped lazily when they are next read; there is no
/// background sweeper. For the expected working set (one entry per distinct
/// browser) this is plenty.
pub struct MemoryIdentityCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryIdentityCache {
    /// Creates a cache whose entries expire `ttl` after their last hit.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a cache with the standard 24-hour sliding TTL.
    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }

    /// Number of live (possibly expired, not yet swept) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl IdentityCache for MemoryIdentityCache {
    fn get(&self, browser_hash: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(browser_hash) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Some(entry.user_id.clone())
            }
            Some(_) => {
                entries.remove(browser_hash);
                None
            }
            None => None,
        }
    }

    fn put(&self, browser_hash: &str, user_id: &str) {
        let entry = CacheEntry {
            user_id: user_id.to_owned(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().insert(browser_hash.to_owned(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn hit_returns_cached_value() {
        let cache = MemoryIdentityCache::with_default_ttl();
        cache.put("hash-a", "ab12");
        assert_eq!(cache.get("hash-a"), Some("ab12".into()));
        assert_eq!(cache.get("hash-b"), None);
    }

    #[test]
    fn zero_ttl_entries_expire_immediately() {
        let cache = MemoryIdentityCache::new(Duration::ZERO);
        cache.put("hash-a", "ab12");
        assert_eq!(cache.get("hash-a"), None);
        // The expired entry was swept on read.
        assert!(cache.is_empty());
    }

    #[test]
    fn hits_slide_the_expiry_forward() {
        let cache = MemoryIdentityCache::new(Duration::from_millis(200));
        cache.put("hash-a", "ab12");

        // Each read lands inside the window and pushes it out again.
        for _ in 0..3 {
            sleep(Duration::from_millis(100));
            assert_eq!(cache.get("hash-a"), Some("ab12".into()));
        }

        // Total elapsed time now exceeds the original TTL by a wide margin;
        // only the refreshes kept the entry alive.
        sleep(Duration::from_millis(300));
        assert_eq!(cache.get("hash-a"), None);
    }

    #[test]
    fn put_replaces_existing_mapping() {
        let cache = MemoryIdentityCache::with_default_ttl();
        cache.put("hash-a", "ab12");
        cache.put("hash-a", "xy99");
        assert_eq!(cache.get("hash-a"), Some("xy99".into()));
        assert_eq!(cache.len(), 1);
    }
}
