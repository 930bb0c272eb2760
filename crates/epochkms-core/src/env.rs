//! Environment abstraction for deterministic testing.
//!
//! Decouples key lifecycle logic from system resources (wall clock,
//! randomness). Production uses the system clock and OS entropy; simulations
//! use a virtual clock and a seeded RNG.

use chrono::{DateTime, Utc};

use crate::error::RandomnessError;

/// Abstract environment providing wall-clock time and secure randomness.
///
/// Implementations typically share state through `Arc`, so clones observe
/// the same clock and RNG stream.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `random_bytes()` either fills the whole buffer or reports an error
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in UTC.
    ///
    /// Key ids are derived from calendar time, so this is not a monotonic
    /// clock. Processes that share a key store should keep their clocks
    /// roughly in sync; a clock far ahead of its peers mints ids they reject
    /// as from the future.
    fn now(&self) -> DateTime<Utc>;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `RandomnessError` if the entropy source is unavailable. The
    /// failure applies to this call only.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), RandomnessError>;
}
