use super::ClientIdentityResolver;
use crate::cache::{IdentityCache, MemoryIdentityCache};
use crate::fingerprint::{ClientSignals, Fingerprint, Identity, extract};
use crate::registry::AllocationRegistry;
use crate::store::{IdentityRecord, IdentityStore, MemoryIdentityStore};
use crate::time::SystemClock;
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Store wrapper counting inserts, so tests can assert that repeat
/// resolutions do not re-persist.
struct CountingStore {
    inner: MemoryIdentityStore,
    saves: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryIdentityStore::new(),
            saves: AtomicUsize::new(0),
        }
    }

    fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl IdentityStore for CountingStore {
    fn find(&self, browser_hash: &str) -> Result<Option<IdentityRecord>> {
        self.inner.find(browser_hash)
    }
    fn save(&self, record: &IdentityRecord) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record)
    }
    fn touch(&self, browser_hash: &str) -> Result<()> {
        self.inner.touch(browser_hash)
    }
    fn allocated_ids(&self) -> Result<Vec<String>> {
        self.inner.allocated_ids()
    }
}

fn resolver_over<S: IdentityStore + 'static>(
    store: Arc<S>,
    cache: Arc<MemoryIdentityCache>,
) -> ClientIdentityResolver<S, MemoryIdentityCache> {
    let registry = Arc::new(AllocationRegistry::new());
    registry.bootstrap(store.as_ref());
    ClientIdentityResolver::new(registry, store, cache, SystemClock)
}

fn browser_hash_of(signals: &ClientSignals) -> String {
    match extract(signals) {
        Identity::Fingerprint(Fingerprint { browser_hash, .. }) => browser_hash,
        Identity::Existing(_) => panic!("signals unexpectedly carried a cookie"),
    }
}

#[test]
fn cookie_wins_regardless_of_other_headers() {
    let resolver = resolver_over(
        Arc::new(MemoryIdentityStore::new()),
        Arc::new(MemoryIdentityCache::with_default_ttl()),
    );
    let signals = ClientSignals {
        identity_cookie: Some("qq77".into()),
        user_agent: Some("Mozilla/5.0".into()),
        accept_language: Some("en-US".into()),
        client_hints: Some("\"Chromium\";v=120".into()),
    };
    assert_eq!(resolver.resolve(&signals), "qq77");

    let other_headers = ClientSignals {
        identity_cookie: Some("qq77".into()),
        user_agent: Some("curl/8.0".into()),
        ..Default::default()
    };
    assert_eq!(resolver.resolve(&other_headers), "qq77");
}

#[test]
fn cache_takes_precedence_over_store() {
    let store = Arc::new(MemoryIdentityStore::new());
    let cache = Arc::new(MemoryIdentityCache::with_default_ttl());

    let signals = ClientSignals {
        user_agent: Some("Mozilla/5.0".into()),
        ..Default::default()
    };
    let hash = browser_hash_of(&signals);

    // Artificial inconsistency: the cache and the store disagree. The
    // chain checks the cache first, so its answer wins.
    cache.put(&hash, "aaaa");
    store
        .save(&IdentityRecord::new(&hash, "bbbb", "UA: Mozilla/5.0"))
        .unwrap();

    let resolver = resolver_over(store, cache);
    assert_eq!(resolver.resolve(&signals), "aaaa");
}

#[test]
fn store_hit_populates_the_cache() {
    let store = Arc::new(MemoryIdentityStore::new());
    let cache = Arc::new(MemoryIdentityCache::with_default_ttl());

    let signals = ClientSignals {
        user_agent: Some("Mozilla/5.0".into()),
        ..Default::default()
    };
    let hash = browser_hash_of(&signals);
    store
        .save(&IdentityRecord::new(&hash, "bbbb", "UA: Mozilla/5.0"))
        .unwrap();

    let resolver = resolver_over(store, Arc::clone(&cache));
    assert_eq!(resolver.resolve(&signals), "bbbb");
    // The durable hit was copied forward into the fast tier.
    assert_eq!(cache.get(&hash), Some("bbbb".into()));
}

#[test]
fn repeat_resolution_is_idempotent_and_cached() {
    let store = Arc::new(CountingStore::new());
    let cache = Arc::new(MemoryIdentityCache::with_default_ttl());
    let resolver = resolver_over(Arc::clone(&store), Arc::clone(&cache));

    let signals = ClientSignals {
        user_agent: Some("A".into()),
        accept_language: Some("en".into()),
        ..Default::default()
    };

    let first = resolver.resolve(&signals);
    assert_eq!(first.len(), 4);
    assert_eq!(store.save_count(), 1);

    // Second call: same identifier, served from the cache, no new durable
    // insert.
    let second = resolver.resolve(&signals);
    assert_eq!(second, first);
    assert_eq!(store.save_count(), 1);
    assert_eq!(cache.get(&browser_hash_of(&signals)), Some(first));
}

#[test]
fn resolution_survives_cache_expiry_via_the_store() {
    let store = Arc::new(CountingStore::new());
    // Zero TTL: every cache entry is dead on arrival, forcing the durable
    // tier on each resolve.
    let cache = Arc::new(MemoryIdentityCache::new(std::time::Duration::ZERO));
    let resolver = resolver_over(Arc::clone(&store), cache);

    let signals = ClientSignals {
        user_agent: Some("A".into()),
        ..Default::default()
    };

    let first = resolver.resolve(&signals);
    let second = resolver.resolve(&signals);
    assert_eq!(first, second);
    // Only the allocation wrote to the store; the second resolve was a
    // durable-tier hit that back-populated the cache, not the store.
    assert_eq!(store.save_count(), 1);
}

#[test]
fn distinct_fingerprints_get_distinct_identifiers() {
    let resolver = Arc::new(resolver_over(
        Arc::new(MemoryIdentityStore::new()),
        Arc::new(MemoryIdentityCache::with_default_ttl()),
    ));

    const WORKERS: usize = 24;
    let mut ids = Vec::with_capacity(WORKERS);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|i| {
                let resolver = Arc::clone(&resolver);
                scope.spawn(move || {
                    let signals = ClientSignals {
                        user_agent: Some(format!("agent-{i}")),
                        ..Default::default()
                    };
                    resolver.resolve(&signals)
                })
            })
            .collect();
        for handle in handles {
            ids.push(handle.join().unwrap());
        }
    });

    let distinct: HashSet<_> = ids.iter().collect();
    assert_eq!(distinct.len(), WORKERS);
}

#[test]
fn header_scenario_end_to_end() {
    let store = Arc::new(CountingStore::new());
    let cache = Arc::new(MemoryIdentityCache::with_default_ttl());
    let resolver = resolver_over(Arc::clone(&store), cache);

    // User-Agent "A", Accept-Language "en", no cookie.
    let signals = ClientSignals {
        user_agent: Some("A".into()),
        accept_language: Some("en".into()),
        ..Default::default()
    };

    let id = resolver.resolve(&signals);
    assert_eq!(id.len(), 4);
    assert_eq!(store.save_count(), 1);

    // Same headers again: same identifier, no second durable insert.
    assert_eq!(resolver.resolve(&signals), id);
    assert_eq!(store.save_count(), 1);
}
