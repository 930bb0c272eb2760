#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{KeyStore, StoreError};

/// In-memory key store for testing and simulation
///
/// All state is wrapped in `Arc<Mutex<>>`, so clones share one map. Several
/// `KeyManager`s built over clones of the same `MemoryStore` behave like
/// independent processes sharing a durable store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Overwrite an object unconditionally.
    ///
    /// Bypasses create-only semantics so tests can plant corrupt or foreign
    /// key material.
    pub fn put(&self, path: &str, bytes: &[u8]) {
        self.lock().insert(path.to_owned(), bytes.to_vec());
    }

    // A writer that panicked mid-insert leaves the map either with or without
    // the whole entry, so poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().get(path).cloned())
    }

    fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError> {
        let mut objects = self.lock();
        if objects.contains_key(path) {
            return Ok(false);
        }

        objects.insert(path.to_owned(), bytes.to_vec());
        Ok(true)
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.lock().remove(path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.read(".keys/a").unwrap(), None);
    }

    #[test]
    fn write_if_missing_only_first_wins() {
        let store = MemoryStore::new();

        assert!(store.write_if_missing(".keys/a", b"first").unwrap());
        assert!(!store.write_if_missing(".keys/a", b"second").unwrap());

        assert_eq!(store.read(".keys/a").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        assert!(store.write_if_missing(".keys/a", b"x").unwrap());
        assert!(!other.write_if_missing(".keys/a", b"y").unwrap());
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn delete_reports_removal() {
        let store = MemoryStore::new();
        store.put(".keys/a", b"x");

        assert!(store.delete(".keys/a").unwrap());
        assert!(!store.delete(".keys/a").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_creates_have_one_winner() {
        let store = MemoryStore::new();

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let store = store.clone();
                    scope.spawn(move || store.write_if_missing(".keys/race", &[i]).unwrap())
                })
                .collect();

            handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
        });

        assert_eq!(winners, 1);
    }
}
