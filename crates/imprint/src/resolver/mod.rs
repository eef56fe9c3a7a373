//! Client identity resolution.
//!
//! Answers "what is this caller's stable identifier" for every
//! content-scoped endpoint. Resolution walks an ordered chain of lookup
//! tiers (fast cache, durable store) and falls through to the allocator;
//! a hit in a later tier back-populates every earlier one. The whole path
//! is infallible toward the caller: tier failures are logged and treated
//! as misses.

#[cfg(test)]
mod tests;

use crate::allocator::IdAllocator;
use crate::cache::IdentityCache;
use crate::fingerprint::{ClientSignals, Fingerprint, Identity, extract};
use crate::registry::AllocationRegistry;
use crate::store::{IdentityRecord, IdentityStore};
use crate::time::{SystemClock, TimeSource};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// One lookup-then-populate stage of the resolution chain.
///
/// Adding a tier (say, a remote cache between the in-process one and the
/// durable store) means implementing this trait and inserting it into the
/// chain; call sites do not change.
pub trait LookupTier: Send + Sync {
    /// Tier name for log lines.
    fn name(&self) -> &'static str;

    /// Looks up the identifier for this fingerprint. Internal failures must
    /// degrade to `None`.
    fn lookup(&self, fingerprint: &Fingerprint) -> Option<String>;

    /// Back-populates this tier after a hit in a later tier. Best-effort.
    fn populate(&self, fingerprint: &Fingerprint, user_id: &str);
}

/// [`LookupTier`] over an [`IdentityCache`]. A hit refreshes the entry's
/// sliding TTL as a side effect of the cache's own `get`.
pub struct CacheTier<C> {
    cache: Arc<C>,
}

impl<C: IdentityCache> CacheTier<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }
}

impl<C: IdentityCache> LookupTier for CacheTier<C> {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Option<String> {
        self.cache.get(&fingerprint.browser_hash)
    }

    fn populate(&self, fingerprint: &Fingerprint, user_id: &str) {
        self.cache.put(&fingerprint.browser_hash, user_id);
    }
}

/// [`LookupTier`] over an [`IdentityStore`]. A hit refreshes the record's
/// `last_seen_at`; store errors are logged and read as misses.
pub struct StoreTier<S> {
    store: Arc<S>,
}

impl<S: IdentityStore> StoreTier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: IdentityStore> LookupTier for StoreTier<S> {
    fn name(&self) -> &'static str {
        "store"
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Option<String> {
        match self.store.find(&fingerprint.browser_hash) {
            Ok(Some(record)) => {
                if let Err(err) = self.store.touch(&fingerprint.browser_hash) {
                    warn!(error = %err, "failed to refresh last-seen timestamp");
                }
                Some(record.user_id)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "identity store lookup failed; treating as miss");
                None
            }
        }
    }

    fn populate(&self, fingerprint: &Fingerprint, user_id: &str) {
        let record = IdentityRecord::new(
            &fingerprint.browser_hash,
            user_id,
            &fingerprint.browser_info,
        );
        if let Err(err) = self.store.save(&record) {
            warn!(error = %err, "failed to back-populate identity store");
        }
    }
}

/// Resolves a caller's stable identifier from its request signals.
///
/// # Example
///
/// ```
/// use imprint::{
///     AllocationRegistry, ClientIdentityResolver, ClientSignals, MemoryIdentityCache,
///     MemoryIdentityStore, SystemClock,
/// };
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryIdentityStore::new());
/// let cache = Arc::new(MemoryIdentityCache::with_default_ttl());
/// let registry = Arc::new(AllocationRegistry::new());
/// registry.bootstrap(store.as_ref());
///
/// let resolver = ClientIdentityResolver::new(registry, store, cache, SystemClock);
///
/// let signals = ClientSignals {
///     user_agent: Some("Mozilla/5.0".into()),
///     ..Default::default()
/// };
/// let id = resolver.resolve(&signals);
/// assert_eq!(id.len(), 4);
/// assert_eq!(resolver.resolve(&signals), id);
/// ```
pub struct ClientIdentityResolver<S, C, T = SystemClock> {
    tiers: Vec<Box<dyn LookupTier>>,
    allocator: IdAllocator<S, C, T>,
}

impl<S, C, T> ClientIdentityResolver<S, C, T>
where
    S: IdentityStore + 'static,
    C: IdentityCache + 'static,
    T: TimeSource,
{
    /// Builds the standard two-tier chain (cache, then durable store) in
    /// front of an allocator with default settings.
    pub fn new(
        registry: Arc<AllocationRegistry>,
        store: Arc<S>,
        cache: Arc<C>,
        clock: T,
    ) -> Self {
        let tiers: Vec<Box<dyn LookupTier>> = vec![
            Box::new(CacheTier::new(Arc::clone(&cache))),
            Box::new(StoreTier::new(Arc::clone(&store))),
        ];
        let allocator = IdAllocator::new(registry, store, cache, clock);
        Self { tiers, allocator }
    }

    /// Builds a resolver from an explicit tier chain and allocator.
    pub fn with_parts(tiers: Vec<Box<dyn LookupTier>>, allocator: IdAllocator<S, C, T>) -> Self {
        Self { tiers, allocator }
    }

    /// Resolves the caller's stable identifier.
    ///
    /// Never fails and never blocks beyond the registry's check-and-insert:
    /// an explicit identity cookie is returned verbatim, tier hits return
    /// the mapped identifier, and a full miss mints a new one.
    pub fn resolve(&self, signals: &ClientSignals) -> String {
        let fingerprint = match extract(signals) {
            Identity::Existing(user_id) => {
                trace!(%user_id, "identity cookie present; skipping fingerprint lookup");
                return user_id;
            }
            Identity::Fingerprint(fp) => fp,
        };

        for (depth, tier) in self.tiers.iter().enumerate() {
            if let Some(user_id) = tier.lookup(&fingerprint) {
                debug!(tier = tier.name(), %user_id, "resolved existing identity");
                for earlier in &self.tiers[..depth] {
                    earlier.populate(&fingerprint, &user_id);
                }
                return user_id;
            }
        }

        self.allocator
            .allocate(&fingerprint.browser_hash, &fingerprint.browser_info)
    }
}
