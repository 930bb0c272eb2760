//! Deterministic simulation harness for epochkms.
//!
//! A seeded [`SimEnv`] (virtual clock, ChaCha20 RNG, switchable entropy
//! failure) drives a [`Cluster`] of independent instances sharing one
//! [`RecordingStore`]. Runs are reproducible from their seed apart from
//! thread interleaving, which is exactly what the race tests vary.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties against a
//! [`ClusterSnapshot`]. Use [`InvariantRegistry::standard()`] for key
//! convergence, single durable write per path and cache/store agreement.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cluster;
pub mod invariants;
pub mod recording_store;
pub mod sim_env;

pub use cluster::Cluster;
pub use invariants::{
    CacheMatchesStore, ClusterSnapshot, InstanceSnapshot, Invariant, InvariantRegistry,
    InvariantResult, KeyConvergence, SingleDurableWrite, Violation,
};
pub use recording_store::{RecordingStore, StoreOp};
pub use sim_env::SimEnv;
