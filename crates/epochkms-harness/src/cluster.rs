//! Multi-instance cluster for convergence testing.
//!
//! N independent [`Kms`] instances with their own caches share one store and
//! one simulated clock, like N processes on one machine pointed at one key
//! directory. Operations can be raced on real threads released together by a
//! barrier.

use std::sync::{Arc, Barrier};

use epochkms_core::{
    ConfigError, Environment, KeyAccess, KeyError, KeyMaterial, KeyStore, Kms, KmsConfig,
    MemoryStore,
};
use tracing::debug;

use crate::{
    SimEnv,
    invariants::{ClusterSnapshot, InstanceSnapshot},
    recording_store::RecordingStore,
};

/// Instances sharing a recorded store and a simulated environment.
pub struct Cluster<S: KeyStore = MemoryStore> {
    instances: Vec<Kms<RecordingStore<S>, SimEnv>>,
    store: RecordingStore<S>,
    env: SimEnv,
}

impl Cluster<MemoryStore> {
    /// `size` instances over a fresh in-memory store with the default config.
    pub fn new(seed: u64, size: usize) -> Result<Self, ConfigError> {
        Self::with_store(MemoryStore::new(), seed, size, &KmsConfig::default())
    }
}

impl<S: KeyStore> Cluster<S> {
    /// `size` instances over `store`.
    pub fn with_store(
        store: S,
        seed: u64,
        size: usize,
        config: &KmsConfig,
    ) -> Result<Self, ConfigError> {
        let env = SimEnv::with_seed(seed);
        let store = RecordingStore::new(store);

        let instances = (0..size)
            .map(|_| Kms::new(store.clone(), env.clone(), config))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(size, seed, "cluster started");
        Ok(Self { instances, store, env })
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the cluster has no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instance `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn instance(&self, index: usize) -> &Kms<RecordingStore<S>, SimEnv> {
        &self.instances[index]
    }

    /// All instances.
    pub fn instances(&self) -> &[Kms<RecordingStore<S>, SimEnv>] {
        &self.instances
    }

    /// The shared store.
    pub fn store(&self) -> &RecordingStore<S> {
        &self.store
    }

    /// The shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Run `op` on every instance concurrently, one thread each, all
    /// released at once. Results are in instance order.
    pub fn race<T, F>(&self, op: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize, &Kms<RecordingStore<S>, SimEnv>) -> T + Sync,
    {
        let barrier = Arc::new(Barrier::new(self.instances.len()));
        let op = &op;

        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .instances
                .iter()
                .enumerate()
                .map(|(index, kms)| {
                    let barrier = Arc::clone(&barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        op(index, kms)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(value) => value,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }

    /// Race every instance to resolve the current key with creation allowed.
    pub fn race_current_key(&self) -> Vec<Result<Arc<KeyMaterial>, KeyError>> {
        let now = self.env.now();
        self.race(|_, kms| {
            let id = kms.keys().current_key_id(now);
            kms.keys().get_or_create_key(id.as_str(), now, KeyAccess::Create)
        })
    }

    /// Capture every cache and the store log.
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            instances: self
                .instances
                .iter()
                .enumerate()
                .map(|(index, kms)| InstanceSnapshot::capture(index, kms))
                .collect(),
            store_ops: self.store.ops(),
        }
    }
}
