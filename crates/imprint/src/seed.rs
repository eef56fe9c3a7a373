/// Strategy controlling how the allocator seeds its very first candidate
/// draw for a fingerprint.
///
/// The deterministic first guess is a best-effort nicety: absent collisions,
/// the same browser fingerprint tends to reproduce the same identifier
/// across allocation attempts. No stated invariant depends on it, so a
/// strategy may simply defer to the time-based seed.
pub trait SeedStrategy: Send + Sync {
    /// Seed for the first candidate drawn for `browser_hash`, or `None` to
    /// fall through to the allocator's time-based seeding.
    fn first_guess_seed(&self, browser_hash: &str) -> Option<u64>;
}

/// Seeds the first guess from an order-dependent hash of the fingerprint.
///
/// Uses the same `total * 31 + byte` rolling hash the front-end applies to
/// its own fingerprint strings, truncated to 32 bits.
#[derive(Default, Clone, Debug)]
pub struct FingerprintSeed;

impl SeedStrategy for FingerprintSeed {
    fn first_guess_seed(&self, browser_hash: &str) -> Option<u64> {
        Some(u64::from(ordered_hash(browser_hash)))
    }
}

/// Never seeds deterministically; every draw uses the time-based seed.
#[derive(Default, Clone, Debug)]
pub struct TimeSeed;

impl SeedStrategy for TimeSeed {
    fn first_guess_seed(&self, _browser_hash: &str) -> Option<u64> {
        None
    }
}

/// Order-dependent 32-bit rolling hash: `total = total * 31 + byte`.
pub(crate) fn ordered_hash(s: &str) -> u32 {
    s.bytes()
        .fold(0u32, |total, b| total.wrapping_mul(31).wrapping_add(u32::from(b)))
}
