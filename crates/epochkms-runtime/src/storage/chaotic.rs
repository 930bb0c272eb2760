//! Chaotic key store wrapper for fault injection testing
//!
//! Randomly fails store operations so tests can check that every key
//! operation either succeeds with correct output or reports a retryable
//! store error, and that independent instances still converge.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use epochkms_core::{KeyStore, StoreError};

/// Chaotic key store that randomly injects failures
///
/// Delegates to an underlying store but fails operations based on a
/// configured failure rate. Failures are injected before delegating, so a
/// failed write never reaches the inner store. Clones share RNG state.
#[derive(Clone)]
pub struct ChaoticStore<S: KeyStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
    failure_count: Arc<AtomicUsize>,
}

/// Linear congruential generator; reproducible for a given seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: KeyStore> ChaoticStore<S> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
            failure_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of store operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::SeqCst)
    }

    /// Number of operations that were failed on purpose.
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn inject(&self) -> Result<(), StoreError> {
        self.operation_count.fetch_add(1, Ordering::SeqCst);

        let fail = self.rng.lock().unwrap_or_else(PoisonError::into_inner).next() < self.failure_rate;
        if fail {
            self.failure_count.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: KeyStore> KeyStore for ChaoticStore<S> {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inject()?;
        self.inner.read(path)
    }

    fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError> {
        self.inject()?;
        self.inner.write_if_missing(path, bytes)
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        self.inject()?;
        self.inner.delete(path)
    }
}

#[cfg(test)]
mod tests {
    use epochkms_core::MemoryStore;

    use super::*;

    #[test]
    fn zero_rate_never_fails() {
        let store = ChaoticStore::new(MemoryStore::new(), 0.0);
        for i in 0..100 {
            store.write_if_missing(&format!(".keys/{i}"), b"x").unwrap();
        }
        assert_eq!(store.failure_count(), 0);
        assert_eq!(store.operation_count(), 100);
    }

    #[test]
    fn full_rate_always_fails_without_touching_inner() {
        let store = ChaoticStore::new(MemoryStore::new(), 1.0);

        assert!(matches!(store.write_if_missing(".keys/a", b"x"), Err(StoreError::Io(_))));
        assert!(store.inner().is_empty());
    }

    #[test]
    fn same_seed_same_failures() {
        let a = ChaoticStore::with_seed(MemoryStore::new(), 0.5, 42);
        let b = ChaoticStore::with_seed(MemoryStore::new(), 0.5, 42);

        let pattern =
            |s: &ChaoticStore<MemoryStore>| (0..64).map(|_| s.read(".keys/a").is_err()).collect::<Vec<_>>();

        assert_eq!(pattern(&a), pattern(&b));
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between")]
    fn rejects_out_of_range_rate() {
        let _ = ChaoticStore::new(MemoryStore::new(), 1.5);
    }
}
