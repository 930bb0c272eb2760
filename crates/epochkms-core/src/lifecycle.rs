//! Key lifecycle: derive, validate, create and resolve keys
//!
//! ```text
//! NoKey ──create──▶ KeyReady ──rotation boundary──▶ KeyReady (old id, decrypt only)
//!                                                        │
//!                                                   max_age elapses
//!                                                        ▼
//!                                                     Expired
//! ```
//!
//! A key is created lazily by the first request that needs the current
//! window. It is read-only afterwards and is never deleted here.

use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use epochkms_crypto::{KEY_MATERIAL_SIZE, KeyMaterial};
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use crate::{
    cache::KeyCache,
    config::KmsConfig,
    convergence::{Resolution, propose_or_adopt, read_material},
    env::Environment,
    error::{ConfigError, KeyError},
    key_id::{KeyId, KeyIdScheme},
    store::KeyStore,
};

/// Whether a lookup may create a missing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAccess {
    /// Encrypting or signing: create the key if the window has none yet
    Create,
    /// Decrypting or verifying: the id came from a payload and must exist
    ExistingOnly,
}

/// Owns the key cache and resolves ids to key material.
///
/// One `KeyManager` per process (or per simulated process). Instances share
/// nothing except the store they are given.
pub struct KeyManager<S: KeyStore, E: Environment> {
    store: S,
    env: E,
    scheme: KeyIdScheme,
    namespace: String,
    cache: KeyCache,
}

impl<S: KeyStore, E: Environment> KeyManager<S, E> {
    /// Validate `config` and build a manager with an empty cache.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`KmsConfig::validate`].
    pub fn new(store: S, env: E, config: &KmsConfig) -> Result<Self, ConfigError> {
        let scheme = config.validate()?;
        let namespace = config.key_namespace.trim_end_matches('/').to_owned();

        Ok(Self { store, env, scheme, namespace, cache: KeyCache::new() })
    }

    /// Id of the window containing `now`.
    pub fn current_key_id(&self, now: DateTime<Utc>) -> KeyId {
        self.scheme.current(now)
    }

    /// Check that an id from a payload is canonical, not from the future and
    /// not expired.
    ///
    /// # Errors
    ///
    /// `MalformedId`, `FutureId` or `Expired`.
    pub fn validate_key_id(&self, id: &str, now: DateTime<Utc>) -> Result<KeyId, KeyError> {
        self.scheme.validate(id, now)
    }

    /// Store path for `id`: `namespace/id`.
    pub fn storage_path(&self, id: &KeyId) -> String {
        format!("{}/{}", self.namespace, id)
    }

    /// Resolve `id` to key material, creating it if allowed.
    ///
    /// # Invariants
    ///
    /// - `ExistingOnly` never writes to the store
    /// - Within one manager, concurrent `Create` calls for one id issue at
    ///   most one store write
    /// - Across managers sharing a store, every caller receives the same
    ///   material for one id
    /// - Cached ids are re-validated on the `Create` path
    ///
    /// # Errors
    ///
    /// - `MalformedId`, `FutureId`, `Expired`: id rejected
    /// - `KeyNotFound`: `ExistingOnly` and the store holds nothing
    /// - `StoreUnavailable`: store failure (retryable)
    /// - `RandomnessUnavailable`: no entropy for a new key
    /// - `CorruptKey`: stored bytes are not a key
    pub fn get_or_create_key(
        &self,
        id: &str,
        now: DateTime<Utc>,
        access: KeyAccess,
    ) -> Result<Arc<KeyMaterial>, KeyError> {
        let validated = match access {
            KeyAccess::ExistingOnly => Some(self.reject_logged(self.scheme.validate(id, now))?),
            KeyAccess::Create => None,
        };

        if let Some(material) = self.cache.get(id) {
            if access == KeyAccess::Create {
                self.reject_logged(self.scheme.validate(id, now))?;
            }
            debug!(key_id = id, "key cache hit");
            return Ok(material);
        }

        debug!(key_id = id, ?access, "key cache miss");
        match validated {
            Some(key_id) => self.load_existing(key_id),
            None => self.create(id),
        }
    }

    /// Evict cached keys that have expired at `now`.
    ///
    /// Returns the number of evicted keys. Expired ids fail validation
    /// whether cached or not, so this only reclaims memory.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let evicted = self.cache.retain(|id| !self.scheme.is_expired(id, now));
        if evicted > 0 {
            debug!(evicted, "pruned expired keys");
        }
        evicted
    }

    /// The validated key id scheme.
    pub fn scheme(&self) -> &KeyIdScheme {
        &self.scheme
    }

    /// The process-local cache.
    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The environment supplying time and randomness.
    pub fn env(&self) -> &E {
        &self.env
    }

    fn create(&self, id: &str) -> Result<Arc<KeyMaterial>, KeyError> {
        let (key_id, _) = self.reject_logged(self.scheme.parse(id))?;

        let guard = self.cache.creation_guard(&key_id);
        let _creating = guard.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have finished while we waited on the guard.
        if let Some(material) = self.cache.get(key_id.as_str()) {
            return Ok(material);
        }

        let mut bytes = [0u8; KEY_MATERIAL_SIZE];
        if let Err(e) = self.env.random_bytes(&mut bytes) {
            error!(key_id = %key_id, error = %e, "no randomness for new key");
            return Err(e.into());
        }
        let proposal = KeyMaterial::from_bytes(bytes);
        bytes.zeroize();

        let path = self.storage_path(&key_id);
        let converged = propose_or_adopt(&self.store, &path, proposal).inspect_err(|e| {
            error!(key_id = %key_id, path = %path, error = %e, "key creation failed");
        })?;

        match converged.resolution {
            Resolution::Proposed => info!(key_id = %key_id, path = %path, "created key"),
            Resolution::Adopted => info!(key_id = %key_id, path = %path, "adopted existing key"),
        }

        Ok(self.cache.insert(key_id, converged.material))
    }

    fn load_existing(&self, key_id: KeyId) -> Result<Arc<KeyMaterial>, KeyError> {
        let path = self.storage_path(&key_id);

        let loaded = read_material(&self.store, &path).inspect_err(|e| {
            error!(key_id = %key_id, path = %path, error = %e, "key read failed");
        })?;

        let Some(material) = loaded else {
            warn!(key_id = %key_id, path = %path, "no key stored for id");
            return Err(KeyError::KeyNotFound { id: key_id.as_str().to_owned() });
        };

        debug!(key_id = %key_id, path = %path, "loaded key from store");
        Ok(self.cache.insert(key_id, material))
    }

    fn reject_logged<T>(&self, result: Result<T, KeyError>) -> Result<T, KeyError> {
        result.inspect_err(|e| warn!(error = %e, "rejected key id"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_types)]

    use std::{
        sync::{
            Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::{
        error::RandomnessError,
        store::{MemoryStore, StoreError},
    };

    #[derive(Clone)]
    struct TestEnv {
        counter: Arc<AtomicUsize>,
        broken: Arc<AtomicBool>,
    }

    impl TestEnv {
        fn new() -> Self {
            Self { counter: Arc::new(AtomicUsize::new(1)), broken: Arc::new(AtomicBool::new(false)) }
        }
    }

    impl Environment for TestEnv {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        }

        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), RandomnessError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(RandomnessError::new("entropy pool empty"));
            }
            let fill = self.counter.fetch_add(1, Ordering::SeqCst) as u8;
            buffer.fill(fill);
            Ok(())
        }
    }

    /// Counts accepted create-only writes.
    #[derive(Clone, Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: Arc<AtomicUsize>,
        reads: Arc<Mutex<Vec<String>>>,
    }

    impl KeyStore for CountingStore {
        fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.reads.lock().unwrap().push(path.to_owned());
            self.inner.read(path)
        }

        fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write_if_missing(path, bytes)
        }

        fn delete(&self, path: &str) -> Result<bool, StoreError> {
            self.inner.delete(path)
        }
    }

    fn hourly_config() -> KmsConfig {
        KmsConfig {
            rotation_period: Duration::from_secs(3600),
            max_age: Duration::from_secs(3 * 3600),
            ..KmsConfig::default()
        }
    }

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, h, m, 0).unwrap()
    }

    fn manager<S: KeyStore>(store: S) -> KeyManager<S, TestEnv> {
        KeyManager::new(store, TestEnv::new(), &hourly_config()).unwrap()
    }

    #[test]
    fn storage_path_joins_namespace() {
        let keys = manager(MemoryStore::new());
        let id = keys.current_key_id(t(12, 30));
        assert_eq!(keys.storage_path(&id), ".keys/20250615_1200");
    }

    #[test]
    fn trailing_slash_in_namespace_is_ignored() {
        let config = KmsConfig { key_namespace: "tenant/keys/".into(), ..hourly_config() };
        let keys = KeyManager::new(MemoryStore::new(), TestEnv::new(), &config).unwrap();

        let id = keys.current_key_id(t(12, 30));
        assert_eq!(keys.storage_path(&id), "tenant/keys/20250615_1200");
    }

    #[test]
    fn create_persists_and_caches() {
        let store = MemoryStore::new();
        let keys = manager(store.clone());
        let id = keys.current_key_id(t(12, 30));

        let material = keys.get_or_create_key(id.as_str(), t(12, 30), KeyAccess::Create).unwrap();

        assert_eq!(store.read(".keys/20250615_1200").unwrap().unwrap(), material.as_bytes());
        assert_eq!(keys.cache().ids(), vec![id]);
    }

    #[test]
    fn existing_only_misses_with_key_not_found() {
        let keys = manager(MemoryStore::new());

        let err = keys.get_or_create_key("20250615_1200", t(12, 30), KeyAccess::ExistingOnly);
        assert_eq!(err.unwrap_err(), KeyError::KeyNotFound { id: "20250615_1200".into() });
    }

    #[test]
    fn existing_only_never_writes() {
        let store = CountingStore::default();
        let keys = manager(store.clone());

        let _ = keys.get_or_create_key("20250615_1200", t(12, 30), KeyAccess::ExistingOnly);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn existing_only_validates_before_store_access() {
        let store = CountingStore::default();
        let keys = manager(store.clone());

        let err = keys.get_or_create_key("20250615_1300", t(12, 30), KeyAccess::ExistingOnly);
        assert!(matches!(err, Err(KeyError::FutureId { .. })));

        let err = keys.get_or_create_key("garbage!!!!!!", t(12, 30), KeyAccess::ExistingOnly);
        assert!(matches!(err, Err(KeyError::MalformedId { .. })));

        assert!(store.reads.lock().unwrap().is_empty());
    }

    #[test]
    fn existing_only_loads_from_other_manager() {
        let store = MemoryStore::new();
        let writer = manager(store.clone());
        let reader = manager(store);

        let id = writer.current_key_id(t(12, 0));
        let written = writer.get_or_create_key(id.as_str(), t(12, 0), KeyAccess::Create).unwrap();
        let read = reader.get_or_create_key(id.as_str(), t(12, 5), KeyAccess::ExistingOnly).unwrap();

        assert_eq!(written, read);
    }

    #[test]
    fn second_manager_adopts_first_key() {
        let store = MemoryStore::new();
        let a = manager(store.clone());
        let b = manager(store.clone());
        let id = a.current_key_id(t(12, 0));

        let first = a.get_or_create_key(id.as_str(), t(12, 0), KeyAccess::Create).unwrap();
        let second = b.get_or_create_key(id.as_str(), t(12, 0), KeyAccess::Create).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn cached_id_is_revalidated_on_create() {
        let keys = manager(MemoryStore::new());
        let id = keys.current_key_id(t(9, 0));
        keys.get_or_create_key(id.as_str(), t(9, 0), KeyAccess::Create).unwrap();
        assert_eq!(keys.cache().len(), 1);

        // Still cached, but 09:00 + 3h is before 12:30.
        let err = keys.get_or_create_key(id.as_str(), t(12, 30), KeyAccess::Create).unwrap_err();
        assert_eq!(err, KeyError::Expired { id: "20250615_0900".into() });
    }

    #[test]
    fn cached_hit_skips_store() {
        let store = CountingStore::default();
        let keys = manager(store.clone());
        let id = keys.current_key_id(t(12, 0));

        keys.get_or_create_key(id.as_str(), t(12, 0), KeyAccess::Create).unwrap();
        keys.get_or_create_key(id.as_str(), t(12, 1), KeyAccess::Create).unwrap();
        keys.get_or_create_key(id.as_str(), t(12, 2), KeyAccess::ExistingOnly).unwrap();

        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert!(store.reads.lock().unwrap().is_empty());
    }

    #[test]
    fn concurrent_creates_write_once() {
        let store = CountingStore::default();
        let keys = manager(store.clone());
        let id = keys.current_key_id(t(12, 0));

        let results: Vec<Arc<KeyMaterial>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(|| {
                        keys.get_or_create_key(id.as_str(), t(12, 0), KeyAccess::Create).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn randomness_failure_is_per_call() {
        let env = TestEnv::new();
        let keys = KeyManager::new(MemoryStore::new(), env.clone(), &hourly_config()).unwrap();
        let id = keys.current_key_id(t(12, 0));

        env.broken.store(true, Ordering::SeqCst);
        let err = keys.get_or_create_key(id.as_str(), t(12, 0), KeyAccess::Create).unwrap_err();
        assert!(matches!(err, KeyError::RandomnessUnavailable(_)));
        assert!(keys.cache().is_empty());

        env.broken.store(false, Ordering::SeqCst);
        assert!(keys.get_or_create_key(id.as_str(), t(12, 0), KeyAccess::Create).is_ok());
    }

    #[test]
    fn corrupt_stored_key_is_reported() {
        let store = MemoryStore::new();
        store.put(".keys/20250615_1200", b"short");
        let keys = manager(store);

        let err = keys.get_or_create_key("20250615_1200", t(12, 30), KeyAccess::ExistingOnly);
        assert_eq!(
            err.unwrap_err(),
            KeyError::CorruptKey { path: ".keys/20250615_1200".into(), length: 5 }
        );
    }

    #[test]
    fn prune_evicts_only_expired() {
        let keys = manager(MemoryStore::new());
        for h in 8..=12 {
            let id = keys.current_key_id(t(h, 0));
            keys.get_or_create_key(id.as_str(), t(h, 0), KeyAccess::Create).unwrap();
        }

        // At 12:30 the windows starting 08:00 and 09:00 are past 3h.
        assert_eq!(keys.prune_expired(t(12, 30)), 2);
        assert_eq!(keys.cache().len(), 3);
        assert_eq!(keys.prune_expired(t(12, 30)), 0);
    }

    #[test]
    fn old_key_survives_rotation_until_max_age() {
        let keys = manager(MemoryStore::new());
        let old = keys.current_key_id(t(10, 0));
        let created = keys.get_or_create_key(old.as_str(), t(10, 0), KeyAccess::Create).unwrap();

        let later = t(10, 0) + TimeDelta::hours(2);
        assert_ne!(keys.current_key_id(later), old);
        assert_eq!(
            keys.get_or_create_key(old.as_str(), later, KeyAccess::ExistingOnly).unwrap(),
            created
        );

        let too_late = t(10, 0) + TimeDelta::hours(3) + TimeDelta::seconds(1);
        assert!(matches!(
            keys.get_or_create_key(old.as_str(), too_late, KeyAccess::ExistingOnly),
            Err(KeyError::Expired { .. })
        ));
    }
}
