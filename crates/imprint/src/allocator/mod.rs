//! Collision-checked short identifier allocation.
//!
//! Given a browser fingerprint with no existing mapping, the allocator
//! searches for a free identifier by escalating candidate length: a
//! deterministic first guess seeded from the fingerprint, then time-seeded
//! retries, then longer candidates, and finally a bounded fallback that
//! degrades to a timestamp-derived identifier. The search always terminates
//! in a returned identifier; persistence failures are logged, never
//! propagated.


use crate::cache::IdentityCache;
use crate::registry::AllocationRegistry;
use crate::seed::{FingerprintSeed, SeedStrategy};
use crate::store::{IdentityRecord, IdentityStore};
use crate::time::{SystemClock, TimeSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Candidate alphabet: upper and lower case letters plus digits, 62 symbols.
pub const ALPHABET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Tunables for the escalating identifier search.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Length of the first candidates tried, and of most identifiers in
    /// practice (62^4 ≈ 14.7M combinations).
    pub default_length: usize,
    /// Suggested maximum length. Crossing it logs a warning but does not
    /// stop the search; the fallback also draws at this length.
    pub soft_max_length: usize,
    /// Hard upper bound on the escalating search. Once every length up to
    /// here has been exhausted the allocator switches to the terminal
    /// fallback. Unreachable outside synthetic saturation.
    pub max_length: usize,
    /// Candidate draws per length before escalating.
    pub retries_per_length: usize,
    /// Random draws the terminal fallback attempts before force-allocating
    /// a timestamp-derived identifier.
    pub fallback_draws: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            default_length: 4,
            soft_max_length: 8,
            max_length: 16,
            retries_per_length: 5,
            fallback_draws: 10,
        }
    }
}

/// Allocates unique short identifiers against an [`AllocationRegistry`].
///
/// The registry's `insert_if_absent` is the only synchronization point:
/// candidate generation runs lock-free, and the membership check plus insert
/// are atomic, so concurrent allocations can never hand out the same
/// identifier.
pub struct IdAllocator<S, C, T = SystemClock> {
    registry: Arc<AllocationRegistry>,
    store: Arc<S>,
    cache: Arc<C>,
    clock: T,
    seed: Box<dyn SeedStrategy>,
    config: AllocatorConfig,
}

impl<S, C, T> IdAllocator<S, C, T>
where
    S: IdentityStore,
    C: IdentityCache,
    T: TimeSource,
{
    /// Creates an allocator with the default configuration and the
    /// fingerprint-seeded first-guess strategy.
    pub fn new(
        registry: Arc<AllocationRegistry>,
        store: Arc<S>,
        cache: Arc<C>,
        clock: T,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            clock,
            seed: Box::new(FingerprintSeed),
            config: AllocatorConfig::default(),
        }
    }

    /// Replaces the search tunables.
    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the first-guess seeding strategy.
    pub fn with_seed_strategy(mut self, seed: Box<dyn SeedStrategy>) -> Self {
        self.seed = seed;
        self
    }

    /// Mints a new identifier for `browser_hash`, registers it, persists
    /// the fingerprint record, and populates the cache.
    ///
    /// Infallible: a store failure downgrades to an in-memory-only
    /// allocation that will not survive a restart.
    pub fn allocate(&self, browser_hash: &str, browser_info: &str) -> String {
        let mut length = self.config.default_length;
        while length <= self.config.max_length {
            if length > self.config.soft_max_length {
                warn!(
                    length,
                    soft_max = self.config.soft_max_length,
                    "candidate length exceeds the suggested maximum"
                );
            }

            for retry in 0..self.config.retries_per_length {
                let candidate = self.draw(length, retry, browser_hash);
                if self.registry.insert_if_absent(&candidate) {
                    if retry > 0 || length > self.config.default_length {
                        info!(user_id = %candidate, length, retry, "allocated new user ID");
                    } else {
                        info!(user_id = %candidate, "allocated new user ID");
                    }
                    self.commit(&candidate, browser_hash, browser_info);
                    return candidate;
                }
            }

            debug!(
                length,
                retries = self.config.retries_per_length,
                "every candidate collided; escalating length"
            );
            length += 1;
        }

        self.fallback(browser_hash, browser_info)
    }

    /// Draws one candidate. The first draw at the default length may use
    /// the deterministic fingerprint seed; everything else is time-seeded
    /// with a retry-dependent offset so pathological cases do not repeat
    /// the same candidate.
    fn draw(&self, length: usize, retry: usize, browser_hash: &str) -> String {
        let mut rng = if retry == 0 && length == self.config.default_length {
            match self.seed.first_guess_seed(browser_hash) {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => self.time_seeded_rng(retry),
            }
        } else {
            self.time_seeded_rng(retry)
        };
        draw_candidate(&mut rng, length)
    }

    fn time_seeded_rng(&self, retry: usize) -> StdRng {
        let nanos = self.clock.unix_nanos() as u64;
        StdRng::seed_from_u64(nanos.wrapping_add(retry as u64 * 100))
    }

    /// Terminal procedure once every length is exhausted: a bounded batch
    /// of random draws at the soft maximum length, then a force-allocated
    /// identifier derived from the current timestamp with no collision
    /// check.
    fn fallback(&self, browser_hash: &str, browser_info: &str) -> String {
        let mut rng = self.time_seeded_rng(0);
        for _ in 0..self.config.fallback_draws {
            let candidate = draw_candidate(&mut rng, self.config.soft_max_length);
            if self.registry.insert_if_absent(&candidate) {
                warn!(user_id = %candidate, "all lengths exhausted; allocated random fallback ID");
                self.commit(&candidate, browser_hash, browser_info);
                return candidate;
            }
        }

        let hexstamp = format!("{:x}", self.clock.unix_nanos());
        let user_id: String = hexstamp
            .chars()
            .take(self.config.soft_max_length)
            .collect();
        self.registry.insert(&user_id);
        warn!(%user_id, "fallback draws exhausted; force-allocated timestamp-derived ID");
        self.commit(&user_id, browser_hash, browser_info);
        user_id
    }

    fn commit(&self, user_id: &str, browser_hash: &str, browser_info: &str) {
        let record = IdentityRecord::new(browser_hash, user_id, browser_info);
        match self.store.save(&record) {
            Ok(()) => self.cache.put(browser_hash, user_id),
            Err(err) => warn!(
                error = %err,
                user_id,
                "failed to persist fingerprint record; keeping in-memory allocation"
            ),
        }
    }
}

fn draw_candidate(rng: &mut StdRng, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
