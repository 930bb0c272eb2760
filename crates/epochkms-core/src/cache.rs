//! Process-local key cache
//!
//! Append-only per id: once material is cached for an id it is never
//! replaced, only evicted when the id expires. Readers share one `RwLock`;
//! creation of distinct ids proceeds in parallel behind per-id guards.

#![allow(clippy::disallowed_types, reason = "Synchronous critical sections only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use epochkms_crypto::KeyMaterial;

use crate::key_id::KeyId;

/// Concurrency-safe map from key id to key material.
///
/// Poisoned locks are recovered: every critical section either inserts a
/// complete entry or does nothing, so a panicking holder cannot leave a
/// partial entry behind.
#[derive(Default)]
pub struct KeyCache {
    keys: RwLock<HashMap<KeyId, Arc<KeyMaterial>>>,
    creation_guards: Mutex<HashMap<KeyId, Arc<Mutex<()>>>>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached material for `id`, if any.
    pub fn get(&self, id: &str) -> Option<Arc<KeyMaterial>> {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    /// Cache `material` for `id` unless the id is already present.
    ///
    /// Returns whatever is cached afterwards. An existing entry always wins,
    /// so every caller observes one value per id.
    pub fn insert(&self, id: KeyId, material: KeyMaterial) -> Arc<KeyMaterial> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(keys.entry(id).or_insert_with(|| Arc::new(material)))
    }

    /// Guard serializing creation of one id within this process.
    ///
    /// Callers lock the guard, re-check the cache, and only then touch the
    /// store. Guards for different ids are independent.
    pub fn creation_guard(&self, id: &KeyId) -> Arc<Mutex<()>> {
        let mut guards = self.creation_guards.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guards.entry(id.clone()).or_default())
    }

    /// Drop every entry and creation guard for which `keep` returns false.
    ///
    /// Returns the number of evicted keys. Guards are filtered by the same
    /// predicate rather than by cache membership, so a creation still in
    /// flight keeps its guard.
    pub fn retain(&self, mut keep: impl FnMut(&KeyId) -> bool) -> usize {
        let evicted = {
            let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
            let before = keys.len();
            keys.retain(|id, _| keep(id));
            before - keys.len()
        };

        self.creation_guards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, _| keep(id));

        evicted
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no keys are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached ids, sorted oldest first.
    pub fn ids(&self) -> Vec<KeyId> {
        let mut ids: Vec<KeyId> =
            self.keys.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        ids.sort();
        ids
    }
}
