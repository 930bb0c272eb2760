//! Observable cluster state for invariant checks.

use std::collections::BTreeMap;

use epochkms_core::{Environment, KeyStore, Kms};

use crate::recording_store::StoreOp;

/// Keys one instance holds in its cache, by storage path.
#[derive(Debug, Clone, Default)]
pub struct InstanceSnapshot {
    /// Position of the instance in its cluster
    pub index: usize,
    /// Storage path to key material bytes
    pub keys: BTreeMap<String, Vec<u8>>,
}

impl InstanceSnapshot {
    /// Capture the cache of `kms`.
    pub fn capture<S: KeyStore, E: Environment>(index: usize, kms: &Kms<S, E>) -> Self {
        let manager = kms.keys();
        let keys = manager
            .cache()
            .ids()
            .into_iter()
            .filter_map(|id| {
                let material = manager.cache().get(id.as_str())?;
                Some((manager.storage_path(&id), material.as_bytes().to_vec()))
            })
            .collect();

        Self { index, keys }
    }
}

/// Cluster state at one point in a simulation.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    /// One entry per instance
    pub instances: Vec<InstanceSnapshot>,
    /// Completed store mutations, oldest first
    pub store_ops: Vec<StoreOp>,
}

impl ClusterSnapshot {
    /// Snapshot with no instances and no store activity.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store contents reconstructed from the operation log.
    pub fn stored(&self) -> BTreeMap<String, Vec<u8>> {
        let mut stored = BTreeMap::new();
        for op in &self.store_ops {
            match op {
                StoreOp::Write { path, bytes, accepted: true } => {
                    stored.insert(path.clone(), bytes.clone());
                },
                StoreOp::Delete { path, removed: true } => {
                    stored.remove(path);
                },
                StoreOp::Write { .. } | StoreOp::Delete { .. } => {},
            }
        }
        stored
    }
}
