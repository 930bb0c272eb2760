//! Durable key stores
//!
//! Implementations of [`epochkms_core::KeyStore`] that outlive the process,
//! plus a fault-injecting wrapper for chaos tests. [`StoreBackend`] picks one
//! at run time from CLI or environment options.

mod chaotic;
mod fs;
mod redb;

use std::path::Path;

pub use chaotic::ChaoticStore;
use clap::ValueEnum;
use epochkms_core::{KeyStore, StoreError};
pub use fs::FsStore;

pub use self::redb::RedbStore;

/// File name used when a redb store is pointed at a directory.
pub const REDB_FILE_NAME: &str = "epochkms.redb";

/// Which durable store to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// One file per key under a directory; shareable between processes
    #[default]
    Fs,
    /// Embedded database file; shared by the threads of one process
    Redb,
}

/// A durable store chosen at run time.
#[derive(Clone)]
pub enum StoreBackend {
    /// Directory of key files
    Fs(FsStore),
    /// Embedded database
    Redb(RedbStore),
}

impl StoreBackend {
    /// Open the store of the given kind at `location`.
    ///
    /// For [`BackendKind::Redb`], a location that is an existing directory
    /// holds the database as [`REDB_FILE_NAME`] inside it.
    pub fn open(kind: BackendKind, location: &Path) -> Result<Self, StoreError> {
        match kind {
            BackendKind::Fs => Ok(Self::Fs(FsStore::open(location)?)),
            BackendKind::Redb => {
                let file = if location.is_dir() {
                    location.join(REDB_FILE_NAME)
                } else {
                    location.to_path_buf()
                };
                Ok(Self::Redb(RedbStore::open(file)?))
            },
        }
    }

    /// Which kind of store this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Fs(_) => BackendKind::Fs,
            Self::Redb(_) => BackendKind::Redb,
        }
    }
}

impl KeyStore for StoreBackend {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Self::Fs(store) => store.read(path),
            Self::Redb(store) => store.read(path),
        }
    }

    fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError> {
        match self {
            Self::Fs(store) => store.write_if_missing(path, bytes),
            Self::Redb(store) => store.write_if_missing(path, bytes),
        }
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        match self {
            Self::Fs(store) => store.delete(path),
            Self::Redb(store) => store.delete(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redb_in_directory_uses_default_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreBackend::open(BackendKind::Redb, dir.path()).unwrap();

        assert_eq!(store.kind(), BackendKind::Redb);
        assert!(dir.path().join(REDB_FILE_NAME).exists());
    }

    #[test]
    fn fs_backend_writes_files_under_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreBackend::open(BackendKind::Fs, &dir.path().join("keys")).unwrap();

        assert!(store.write_if_missing(".keys/20250101_0000", b"key").unwrap());
        assert!(dir.path().join("keys/.keys/20250101_0000").exists());
    }

    #[test]
    fn backends_share_create_only_semantics() {
        let dir = tempfile::tempdir().unwrap();

        for kind in [BackendKind::Fs, BackendKind::Redb] {
            let location = dir.path().join(format!("{kind:?}"));
            std::fs::create_dir_all(&location).unwrap();
            let store = StoreBackend::open(kind, &location).unwrap();

            assert!(store.write_if_missing(".keys/a", b"first").unwrap());
            assert!(!store.write_if_missing(".keys/a", b"second").unwrap());
            assert_eq!(store.read(".keys/a").unwrap(), Some(b"first".to_vec()));
            assert!(store.delete(".keys/a").unwrap());
        }
    }
}
