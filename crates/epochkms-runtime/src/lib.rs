//! epochkms production runtime.
//!
//! Production glue around [`epochkms_core`]: the system clock and OS
//! randomness, durable key stores, configuration loading, and the commands
//! behind the `epochkms` binary.
//!
//! # Components
//!
//! - [`SystemEnv`]: production environment (real time, crypto RNG)
//! - [`FsStore`]: one file per key, shareable between processes
//! - [`RedbStore`]: embedded database for a single process
//! - [`ChaoticStore`]: fault injection for chaos tests
//! - [`StoreBackend`]: run-time choice between the durable stores
//! - [`settings`]: JSON config file plus flag and environment overrides
//! - [`commands`]: CLI subcommands

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
mod error;
pub mod settings;
pub mod storage;
mod system_env;

pub use commands::Command;
pub use error::RuntimeError;
pub use settings::ConfigOverrides;
pub use storage::{BackendKind, ChaoticStore, FsStore, RedbStore, StoreBackend};
pub use system_env::SystemEnv;
