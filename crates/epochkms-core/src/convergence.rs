//! Propose → adopt: lock-free convergence on one key per window
//!
//! Processes that share a key store never talk to each other. Each one that
//! finds no key for a window generates a full proposal and offers it through
//! the store's create-only write. Exactly one write is accepted; every other
//! process reads the accepted bytes back and adopts them.
//!
//! ```text
//! process A                    store                    process B
//!    │ write_if_missing(p, a) ──▶ │                          │
//!    │ ◀── true (persisted)       │ ◀── write_if_missing(p, b)
//!    │                            │ ──▶ false (exists)       │
//!    │                            │ ◀── read(p)              │
//!    │                            │ ──▶ a                    │
//!  uses a                                                  uses a
//! ```

use epochkms_crypto::KeyMaterial;

use crate::{
    error::KeyError,
    store::{KeyStore, StoreError},
};

/// How a proposal was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// This process's proposal was persisted
    Proposed,
    /// Another writer got there first; its bytes were adopted
    Adopted,
}

/// Outcome of [`propose_or_adopt`].
#[derive(Debug)]
pub struct Converged {
    /// The material every process will use for this path
    pub material: KeyMaterial,
    /// Whether the material is ours or adopted
    pub resolution: Resolution,
}

/// Offer `proposal` at `path`; adopt the stored value if one exists.
///
/// # Errors
///
/// - `StoreUnavailable`: the store failed, or reported existing data that a
///   read-back could not find (`StoreError::Vanished`)
/// - `CorruptKey`: the stored bytes are not a key
pub fn propose_or_adopt<S: KeyStore>(
    store: &S,
    path: &str,
    proposal: KeyMaterial,
) -> Result<Converged, KeyError> {
    if store.write_if_missing(path, proposal.as_bytes())? {
        return Ok(Converged { material: proposal, resolution: Resolution::Proposed });
    }

    let Some(material) = read_material(store, path)? else {
        return Err(StoreError::Vanished { path: path.to_owned() }.into());
    };

    Ok(Converged { material, resolution: Resolution::Adopted })
}

/// Read and decode the key stored at `path`.
///
/// # Errors
///
/// - `StoreUnavailable`: the store failed
/// - `CorruptKey`: the stored bytes are not a key
pub fn read_material<S: KeyStore>(store: &S, path: &str) -> Result<Option<KeyMaterial>, KeyError> {
    let Some(bytes) = store.read(path)? else {
        return Ok(None);
    };

    KeyMaterial::from_slice(&bytes)
        .map(Some)
        .map_err(|_| KeyError::CorruptKey { path: path.to_owned(), length: bytes.len() })
}
