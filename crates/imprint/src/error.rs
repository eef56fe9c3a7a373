pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the identity subsystem.
///
/// Only the durable tier produces errors; the resolver itself is infallible
/// toward its caller. Store failures surface here so tier adapters can log
/// them and degrade instead of aborting resolution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Durable identity store I/O failed.
    #[error("identity store I/O error: {0}")]
    Store(#[from] std::io::Error),

    /// The file-backed store could not encode or decode its index.
    #[error("identity index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
