use super::{IdentityRecord, IdentityStore};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::SystemTime;

/// In-memory [`IdentityStore`].
///
/// Durable only for the lifetime of the process; intended for tests and for
/// deployments that accept re-fingerprinting after a restart.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: Mutex<HashMap<String, IdentityRecord>>,
}

impl MemoryIdentityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn find(&self, browser_hash: &str) -> Result<Option<IdentityRecord>> {
        Ok(self.records.lock().get(browser_hash).cloned())
    }

    fn save(&self, record: &IdentityRecord) -> Result<()> {
        let mut records = self.records.lock();
        match records.get_mut(&record.browser_hash) {
            Some(existing) => existing.last_seen_at = SystemTime::now(),
            None => {
                records.insert(record.browser_hash.clone(), record.clone());
            }
        }
        Ok(())
    }

    fn touch(&self, browser_hash: &str) -> Result<()> {
        if let Some(record) = self.records.lock().get_mut(browser_hash) {
            record.last_seen_at = SystemTime::now();
        }
        Ok(())
    }

    fn allocated_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .records
            .lock()
            .values()
            .map(|r| r.user_id.clone())
            .collect())
    }
}
