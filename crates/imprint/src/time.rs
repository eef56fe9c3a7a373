use std::time::{SystemTime, UNIX_EPOCH};

/// A trait for time sources that return a high-resolution wall-clock
/// timestamp.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests. The allocator uses it for time-based PRNG seeding
/// and for the terminal timestamp-derived identifier.
///
/// # Example
///
/// ```
/// use imprint::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn unix_nanos(&self) -> u128 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.unix_nanos(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in nanoseconds since the Unix epoch.
    fn unix_nanos(&self) -> u128;
}

/// The default [`TimeSource`] backed by [`SystemTime`].
///
/// A clock set before the Unix epoch reads as zero rather than panicking.
#[derive(Default, Clone, Debug)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn unix_nanos(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    }
}
