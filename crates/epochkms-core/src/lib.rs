//! epochkms Core
//!
//! Time-windowed symmetric key management. Derives the current key id from
//! wall-clock time, creates key material lazily, converges independent
//! processes on one key per window through a shared store, and uses the keys
//! to encrypt and sign payloads that name their own key.
//!
//! # Architecture
//!
//! ```text
//! Kms::encrypt / decrypt / sign / verify (+ text, JSON)
//!            │
//!            ▼
//!       KeyManager ──▶ KeyCache (process-local)
//!            │ miss
//!            ▼
//!     propose_or_adopt ──▶ KeyStore (shared, create-only writes)
//! ```
//!
//! # Components
//!
//! - [`env`]: clock and randomness, injectable for simulation
//! - [`config`]: rotation period, max age, id template, store namespace
//! - [`key_id`]: window alignment, id rendering, parsing and validation
//! - [`store`]: the `KeyStore` trait and an in-memory implementation
//! - [`cache`]: append-only per-id cache with creation guards
//! - [`convergence`]: the propose → adopt step
//! - [`lifecycle`]: `KeyManager`, resolving ids to material
//! - [`wire`]: payload framing
//! - [`kms`]: the public facade

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cache;
pub mod config;
pub mod convergence;
pub mod env;
pub mod error;
pub mod key_id;
pub mod kms;
pub mod lifecycle;
pub mod store;
pub mod wire;

pub use cache::KeyCache;
pub use config::KmsConfig;
pub use convergence::{Converged, Resolution, propose_or_adopt};
pub use env::Environment;
pub use epochkms_crypto::KeyMaterial;
pub use error::{ConfigError, KeyError, RandomnessError};
pub use key_id::{KeyId, KeyIdScheme};
pub use kms::Kms;
pub use lifecycle::{KeyAccess, KeyManager};
pub use store::{KeyStore, MemoryStore, StoreError};
