//! Storage backend contract.

use std::time::Duration;

use crate::Result;

/// Capability contract for session storage backends.
///
/// A backend maps a session identifier to an opaque byte payload. It knows
/// nothing about the key/value structure above it. Implementations must be
/// safe to call from many request threads at once; the file store gets this
/// for free because all of its state lives on disk.
///
/// All methods block. Async callers should run them on a blocking pool.
pub trait SessionHandler: Send + Sync {
    /// Load the payload stored for `id`.
    ///
    /// An identifier with no record yields an empty payload, not an error.
    fn read(&self, id: &str) -> Result<Vec<u8>>;

    /// Replace the payload stored for `id` in full.
    fn write(&self, id: &str, payload: &[u8]) -> Result<()>;

    /// Remove the record for `id`. Removing an absent record succeeds.
    fn destroy(&self, id: &str) -> Result<()>;

    /// Remove records not written for longer than `max_lifetime`.
    ///
    /// Returns the number of records removed.
    fn gc(&self, max_lifetime: Duration) -> Result<usize>;
}
