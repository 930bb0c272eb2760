//! Key store abstraction
//!
//! Durable object storage keyed by string path. The trait is synchronous:
//! store I/O is the only blocking step in a key lookup, and callers run it on
//! whatever thread asked for the key.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

/// Durable storage for key material.
///
/// Must be Clone (one handle per `KeyManager`), Send + Sync (shared across
/// worker threads), and synchronous. Implementations typically share state
/// via Arc, so clones access the same underlying storage.
///
/// Processes that never talk to each other converge on one key per window
/// only through [`KeyStore::write_if_missing`], so its atomicity is the
/// load-bearing contract of every implementation.
pub trait KeyStore: Clone + Send + Sync + 'static {
    /// Read the object at `path`.
    ///
    /// Returns `None` if nothing is stored there. Not-found is never an
    /// error.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Create the object at `path` only if it does not exist.
    ///
    /// # Invariants
    ///
    /// - Atomic across every caller of every process sharing the store
    /// - Returns `true` iff `bytes` were persisted by this call
    /// - A reader never observes a partially written object
    fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError>;

    /// Remove the object at `path`.
    ///
    /// Returns `true` iff something was removed. Key lifecycle never deletes;
    /// this exists for operators and tests.
    fn delete(&self, path: &str) -> Result<bool, StoreError>;
}
