//! Store wrapper that records every completed write and delete.
//!
//! Invariant checks read the log instead of the store, so they work even
//! when the wrapped store fails reads on purpose.

#![allow(clippy::disallowed_types, reason = "Locking the operation log")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use epochkms_core::{KeyStore, StoreError};

/// One completed store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `write_if_missing` returned `Ok`
    Write {
        /// Target path
        path: String,
        /// Proposed bytes
        bytes: Vec<u8>,
        /// Whether the store persisted them
        accepted: bool,
    },
    /// `delete` returned `Ok`
    Delete {
        /// Target path
        path: String,
        /// Whether anything was removed
        removed: bool,
    },
}

/// [`KeyStore`] wrapper with an operation log.
///
/// Failed operations are not logged. Clones share the log.
#[derive(Clone)]
pub struct RecordingStore<S: KeyStore> {
    inner: S,
    log: Arc<Mutex<Vec<StoreOp>>>,
}

impl<S: KeyStore> RecordingStore<S> {
    /// Wrap `inner` with an empty log.
    pub fn new(inner: S) -> Self {
        Self { inner, log: Arc::new(Mutex::new(Vec::new())) }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Every logged operation, oldest first.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.log().clone()
    }

    /// Number of accepted writes to `path`.
    pub fn accepted_writes(&self, path: &str) -> usize {
        self.log()
            .iter()
            .filter(|op| matches!(op, StoreOp::Write { path: p, accepted: true, .. } if p == path))
            .count()
    }

    /// Total number of `write_if_missing` calls that returned `Ok`.
    pub fn write_attempts(&self) -> usize {
        self.log().iter().filter(|op| matches!(op, StoreOp::Write { .. })).count()
    }

    fn log(&self) -> MutexGuard<'_, Vec<StoreOp>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: KeyStore> KeyStore for RecordingStore<S> {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.read(path)
    }

    fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError> {
        let accepted = self.inner.write_if_missing(path, bytes)?;
        self.log().push(StoreOp::Write { path: path.to_owned(), bytes: bytes.to_vec(), accepted });
        Ok(accepted)
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let removed = self.inner.delete(path)?;
        self.log().push(StoreOp::Delete { path: path.to_owned(), removed });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use epochkms_core::MemoryStore;

    use super::*;

    #[test]
    fn logs_outcomes_of_writes_and_deletes() {
        let store = RecordingStore::new(MemoryStore::new());

        store.write_if_missing("k", b"a").unwrap();
        store.write_if_missing("k", b"b").unwrap();
        store.delete("k").unwrap();

        assert_eq!(store.write_attempts(), 2);
        assert_eq!(store.accepted_writes("k"), 1);
        assert_eq!(
            store.ops().last(),
            Some(&StoreOp::Delete { path: "k".to_owned(), removed: true })
        );
    }

    #[test]
    fn reads_are_not_logged() {
        let store = RecordingStore::new(MemoryStore::new());
        store.read("k").unwrap();
        assert!(store.ops().is_empty());
    }
}
