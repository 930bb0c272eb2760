//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::BTreeMap;

use super::{ClusterSnapshot, Invariant, InvariantResult, Violation};
use crate::recording_store::StoreOp;

/// Instances that cache the same key id hold the same material.
///
/// Two instances encrypting under one id with different bytes would produce
/// payloads the other cannot open.
pub struct KeyConvergence;

impl Invariant for KeyConvergence {
    fn name(&self) -> &'static str {
        "key_convergence"
    }

    fn check(&self, state: &ClusterSnapshot) -> InvariantResult {
        let mut first_seen: BTreeMap<&str, (usize, &[u8])> = BTreeMap::new();

        for instance in &state.instances {
            for (path, bytes) in &instance.keys {
                let (owner, expected) =
                    *first_seen.entry(path.as_str()).or_insert((instance.index, bytes.as_slice()));
                if expected != bytes.as_slice() {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "instances {owner} and {} hold different material for {path}",
                            instance.index
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Each storage path accepts at most one write.
///
/// Create-only writes are the only mutation besides delete; a second
/// accepted write would mean a key was replaced under live payloads.
pub struct SingleDurableWrite;

impl Invariant for SingleDurableWrite {
    fn name(&self) -> &'static str {
        "single_durable_write"
    }

    fn check(&self, state: &ClusterSnapshot) -> InvariantResult {
        let mut live: BTreeMap<&str, usize> = BTreeMap::new();

        for op in &state.store_ops {
            match op {
                StoreOp::Write { path, accepted: true, .. } => {
                    let count = live.entry(path.as_str()).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!("{path} accepted a second write"),
                        });
                    }
                },
                StoreOp::Delete { path, removed: true } => {
                    live.remove(path.as_str());
                },
                StoreOp::Write { .. } | StoreOp::Delete { .. } => {},
            }
        }
        Ok(())
    }
}

/// Cached material equals what the store holds for that path.
///
/// Paths the store no longer holds (deleted keys) are skipped; caches are
/// append-only and may outlive a delete.
pub struct CacheMatchesStore;

impl Invariant for CacheMatchesStore {
    fn name(&self) -> &'static str {
        "cache_matches_store"
    }

    fn check(&self, state: &ClusterSnapshot) -> InvariantResult {
        let stored = state.stored();

        for instance in &state.instances {
            for (path, bytes) in &instance.keys {
                if let Some(expected) = stored.get(path)
                    && expected != bytes
                {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("instance {} caches stale material for {path}", instance.index),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::InstanceSnapshot;

    fn instance(index: usize, path: &str, byte: u8) -> InstanceSnapshot {
        InstanceSnapshot { index, keys: BTreeMap::from([(path.to_owned(), vec![byte; 4])]) }
    }

    fn write(path: &str, byte: u8, accepted: bool) -> StoreOp {
        StoreOp::Write { path: path.to_owned(), bytes: vec![byte; 4], accepted }
    }

    #[test]
    fn divergent_caches_violate_convergence() {
        let state = ClusterSnapshot {
            instances: vec![instance(0, "k", 1), instance(1, "k", 2)],
            store_ops: Vec::new(),
        };
        assert!(KeyConvergence.check(&state).is_err());
    }

    #[test]
    fn rejected_writes_do_not_count() {
        let state = ClusterSnapshot {
            instances: Vec::new(),
            store_ops: vec![write("k", 1, true), write("k", 2, false), write("k", 3, false)],
        };
        assert!(SingleDurableWrite.check(&state).is_ok());
    }

    #[test]
    fn second_accepted_write_is_a_violation() {
        let state = ClusterSnapshot {
            instances: Vec::new(),
            store_ops: vec![write("k", 1, true), write("k", 2, true)],
        };
        assert!(SingleDurableWrite.check(&state).is_err());
    }

    #[test]
    fn write_after_delete_is_allowed() {
        let state = ClusterSnapshot {
            instances: Vec::new(),
            store_ops: vec![
                write("k", 1, true),
                StoreOp::Delete { path: "k".to_owned(), removed: true },
                write("k", 2, true),
            ],
        };
        assert!(SingleDurableWrite.check(&state).is_ok());
    }

    #[test]
    fn stale_cache_is_a_violation() {
        let state = ClusterSnapshot {
            instances: vec![instance(0, "k", 9)],
            store_ops: vec![write("k", 1, true)],
        };
        assert!(CacheMatchesStore.check(&state).is_err());
    }

    #[test]
    fn cache_of_deleted_key_is_tolerated() {
        let state = ClusterSnapshot {
            instances: vec![instance(0, "k", 1)],
            store_ops: vec![
                write("k", 1, true),
                StoreOp::Delete { path: "k".to_owned(), removed: true },
            ],
        };
        assert!(CacheMatchesStore.check(&state).is_ok());
    }
}
