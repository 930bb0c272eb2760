//! Redb-backed durable key store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. A redb
//! file is locked by the process that opens it, so this store converges the
//! threads of one process; processes that must share keys use `FsStore`.

use std::{path::Path, sync::Arc};

use epochkms_core::{KeyStore, StoreError};
use redb::{Database, ReadableTable, TableDefinition};

/// Table: keys
/// Key: store path (e.g. `.keys/20250101_0000`)
/// Value: raw key material
const KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("keys");

/// Durable key store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        let txn = db.begin_write().map_err(io_error)?;
        {
            let _ = txn.open_table(KEYS).map_err(io_error)?;
        }
        txn.commit().map_err(io_error)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyStore for RedbStore {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(KEYS).map_err(io_error)?;

        Ok(table.get(path).map_err(io_error)?.map(|value| value.value().to_vec()))
    }

    fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError> {
        // Redb admits one write transaction at a time, so the existence check
        // and the insert cannot interleave with another writer.
        let txn = self.db.begin_write().map_err(io_error)?;

        let inserted = {
            let mut table = txn.open_table(KEYS).map_err(io_error)?;
            if table.get(path).map_err(io_error)?.is_some() {
                false
            } else {
                table.insert(path, bytes).map_err(io_error)?;
                true
            }
        };

        if inserted {
            txn.commit().map_err(io_error)?;
        } else {
            txn.abort().map_err(io_error)?;
        }

        Ok(inserted)
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin_write().map_err(io_error)?;

        let removed = {
            let mut table = txn.open_table(KEYS).map_err(io_error)?;
            table.remove(path).map_err(io_error)?.is_some()
        };

        txn.commit().map_err(io_error)?;
        Ok(removed)
    }
}

fn io_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_if_missing_is_create_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("keys.redb")).unwrap();

        assert!(store.write_if_missing(".keys/a", b"first").unwrap());
        assert!(!store.write_if_missing(".keys/a", b"second").unwrap());
        assert_eq!(store.read(".keys/a").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("keys.redb")).unwrap();

        assert_eq!(store.read(".keys/missing").unwrap(), None);
    }

    #[test]
    fn delete_reports_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("keys.redb")).unwrap();

        store.write_if_missing(".keys/a", b"x").unwrap();
        assert!(store.delete(".keys/a").unwrap());
        assert!(!store.delete(".keys/a").unwrap());
        assert_eq!(store.read(".keys/a").unwrap(), None);
    }

    #[test]
    fn concurrent_writers_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("keys.redb")).unwrap();

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let store = store.clone();
                    scope.spawn(move || store.write_if_missing(".keys/race", &[i]).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
        });

        assert_eq!(winners, 1);
    }
}
