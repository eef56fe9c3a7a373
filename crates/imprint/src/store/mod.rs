//! Durable identity storage.
//!
//! The durable store is the source of truth for fingerprint-to-identifier
//! assignments across process restarts. It maps a `browser_hash` to exactly
//! one [`IdentityRecord`]; uniqueness is enforced on the hash only, never on
//! the identifier itself — the in-memory [`AllocationRegistry`] is the sole
//! collision guard for identifiers, which is an accepted single-process
//! limitation.
//!
//! [`AllocationRegistry`]: crate::AllocationRegistry

mod json;
mod memory;

pub use json::JsonIdentityStore;
pub use memory::MemoryIdentityStore;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// One fingerprint-to-identifier assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Hex digest of the browser signals; the unique key.
    pub browser_hash: String,
    /// The allocated short identifier.
    pub user_id: String,
    /// Free-text description of the originating signals, for diagnostics.
    pub browser_info: String,
    /// First-seen timestamp. Immutable after creation.
    pub created_at: SystemTime,
    /// Refreshed on every successful lookup.
    pub last_seen_at: SystemTime,
}

impl IdentityRecord {
    /// Creates a record stamped with the current time.
    pub fn new(browser_hash: &str, user_id: &str, browser_info: &str) -> Self {
        let now = SystemTime::now();
        Self {
            browser_hash: browser_hash.to_owned(),
            user_id: user_id.to_owned(),
            browser_info: browser_info.to_owned(),
            created_at: now,
            last_seen_at: now,
        }
    }
}

/// Persistent table of [`IdentityRecord`]s keyed by `browser_hash`.
///
/// Implementations must be safe to call from concurrent request workers.
/// Callers in the resolution path treat every error as a soft failure: they
/// log it and carry on with the identifier they already have.
pub trait IdentityStore: Send + Sync {
    /// Point lookup by fingerprint hash.
    fn find(&self, browser_hash: &str) -> Result<Option<IdentityRecord>>;

    /// Inserts a new record, or refreshes `last_seen_at` if a record with
    /// the same `browser_hash` already exists. `created_at` is never
    /// touched on the update path.
    fn save(&self, record: &IdentityRecord) -> Result<()>;

    /// Refreshes `last_seen_at` on an existing record. Unknown hashes are a
    /// no-op.
    fn touch(&self, browser_hash: &str) -> Result<()>;

    /// Every allocated `user_id`, for registry bootstrap.
    fn allocated_ids(&self) -> Result<Vec<String>>;
}
