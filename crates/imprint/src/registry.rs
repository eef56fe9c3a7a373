use crate::store::IdentityStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{info, warn};

/// Process-wide set of user identifiers already handed out.
///
/// The registry is the single source of truth for collision checks during
/// allocation. It is constructed once at process start, bulk-loaded from the
/// durable store via [`bootstrap`], and then grows monotonically for the
/// lifetime of the process; there is no removal path.
///
/// All mutation funnels through one mutex so that a membership check and the
/// subsequent insert are atomic with respect to concurrent allocations.
///
/// # Example
///
/// ```
/// use imprint::AllocationRegistry;
///
/// let registry = AllocationRegistry::new();
/// assert!(registry.insert_if_absent("ab12"));
/// assert!(!registry.insert_if_absent("ab12"));
/// assert!(registry.contains("ab12"));
/// ```
///
/// [`bootstrap`]: AllocationRegistry::bootstrap
#[derive(Debug, Default)]
pub struct AllocationRegistry {
    ids: Mutex<HashSet<String>>,
}

impl AllocationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` has already been allocated.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.lock().contains(id)
    }

    /// Atomically inserts `id` if it is not yet allocated.
    ///
    /// Returns `true` if the identifier was free and is now claimed by the
    /// caller, `false` if it was already taken. The check and the insert
    /// happen under one lock acquisition; this is the correctness anchor for
    /// concurrent allocation.
    pub fn insert_if_absent(&self, id: &str) -> bool {
        let mut ids = self.ids.lock();
        if ids.contains(id) {
            false
        } else {
            ids.insert(id.to_owned());
            true
        }
    }

    /// Inserts `id` unconditionally.
    ///
    /// Only the allocator's terminal timestamp fallback uses this; that path
    /// deliberately skips the collision check.
    pub fn insert(&self, id: &str) {
        self.ids.lock().insert(id.to_owned());
    }

    /// Bulk-inserts identifiers, returning how many were newly added.
    pub fn absorb<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut guard = self.ids.lock();
        let before = guard.len();
        guard.extend(ids);
        guard.len() - before
    }

    /// Number of identifiers currently registered.
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Returns whether no identifiers are registered.
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Loads every allocated identifier from the durable store.
    ///
    /// Must run before any request is served: the allocator's collision
    /// check is purely in-memory, so a restarted process that skips this
    /// could re-issue an identifier already bound to a different browser.
    ///
    /// A failed read is logged and leaves the registry as-is. The process
    /// keeps serving in that degraded state; identifiers allocated afterward
    /// may collide with durable records from a previous life.
    pub fn bootstrap<S>(&self, store: &S)
    where
        S: IdentityStore + ?Sized,
    {
        match store.allocated_ids() {
            Ok(ids) => {
                let added = self.absorb(ids);
                info!(count = added, "loaded allocated user IDs into registry");
            }
            Err(err) => {
                warn!(error = %err, "registry bootstrap failed; starting with an empty set");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IdentityRecord, IdentityStore, MemoryIdentityStore};
    use crate::{Error, Result};

    #[test]
    fn insert_if_absent_claims_once() {
        let registry = AllocationRegistry::new();
        assert!(registry.insert_if_absent("xy99"));
        assert!(!registry.insert_if_absent("xy99"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn absorb_counts_new_entries_only() {
        let registry = AllocationRegistry::new();
        registry.insert("ab12");
        let added = registry.absorb(vec!["ab12".into(), "xy99".into()]);
        assert_eq!(added, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn bootstrap_loads_store_ids() {
        let store = MemoryIdentityStore::new();
        store
            .save(&IdentityRecord::new("hash-a", "ab12", "UA: A"))
            .unwrap();
        store
            .save(&IdentityRecord::new("hash-b", "xy99", "UA: B"))
            .unwrap();

        let registry = AllocationRegistry::new();
        registry.bootstrap(&store);

        assert!(registry.contains("ab12"));
        assert!(registry.contains("xy99"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn bootstrap_failure_leaves_registry_empty() {
        struct BrokenStore;
        impl IdentityStore for BrokenStore {
            fn find(&self, _: &str) -> Result<Option<IdentityRecord>> {
                unreachable!("bootstrap only enumerates IDs")
            }
            fn save(&self, _: &IdentityRecord) -> Result<()> {
                unreachable!()
            }
            fn touch(&self, _: &str) -> Result<()> {
                unreachable!()
            }
            fn allocated_ids(&self) -> Result<Vec<String>> {
                Err(Error::Store(std::io::Error::other("disk gone")))
            }
        }

        let registry = AllocationRegistry::new();
        registry.bootstrap(&BrokenStore);
        assert!(registry.is_empty());
    }
}
