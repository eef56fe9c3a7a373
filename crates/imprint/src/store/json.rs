use super::{IdentityRecord, IdentityStore};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File-backed [`IdentityStore`] persisting its full index as one JSON
/// document.
///
/// The index is read once at open and held in memory; every mutation
/// rewrites the file while the index lock is held, so concurrent writers
/// serialize on the same mutex that guards the map. Suitable for the
/// single-writer-process deployments this subsystem assumes.
pub struct JsonIdentityStore {
    path: PathBuf,
    records: Mutex<HashMap<String, IdentityRecord>>,
}

impl JsonIdentityStore {
    /// Opens the store at `path`, loading the existing index if the file is
    /// present and creating parent directories otherwise.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            HashMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    // Caller must hold the records lock so the snapshot on disk matches the
    // map it just mutated.
    fn persist(&self, records: &HashMap<String, IdentityRecord>) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl IdentityStore for JsonIdentityStore {
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
        self.persist(&records)
    }

    fn touch(&self, browser_hash: &str) -> Result<()> {
        let mut records = self.records.lock();
        match records.get_mut(browser_hash) {
            Some(record) => {
                record.last_seen_at = SystemTime::now();
                self.persist(&records)
            }
            None => Ok(()),
        }
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
