//! Filesystem key store.
//!
//! One file per key under a base directory. Create-only publication:
//!
//! 1. write the bytes to a temporary file in the target's directory
//! 2. fsync the temporary file
//! 3. hard-link it to the target name, failing if the name exists
//!
//! Readers therefore see either no file or a complete key, and several
//! processes can share one directory.

use std::{
    fs,
    io::{self, Write},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use epochkms_core::{KeyStore, StoreError};
use tempfile::NamedTempFile;
use tracing::warn;

/// Key store backed by a directory.
///
/// Clone is cheap (Arc); clones address the same directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: Arc<PathBuf>,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        Ok(Self { root: Arc::new(root) })
    }

    /// The base directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path onto a file below the root.
    ///
    /// Only plain relative components are accepted: no root, no prefix, no
    /// `..`.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidPath {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };

        let relative = Path::new(path);
        if path.is_empty() || relative.file_name().is_none() {
            return Err(invalid("must name a file"));
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {},
                Component::ParentDir => return Err(invalid("must not contain `..`")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("must be relative"));
                },
            }
        }

        Ok(self.root.join(relative))
    }
}

impl KeyStore for FsStore {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let target = self.resolve(path)?;

        match fs::read(&target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_if_missing(&self, path: &str, bytes: &[u8]) -> Result<bool, StoreError> {
        let target = self.resolve(path)?;
        let dir = target.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;

        match staged.persist_noclobber(&target) {
            Ok(_) => {},
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.error.into()),
        }

        // The key is visible now; a failed directory sync only weakens
        // durability across power loss.
        if let Err(e) = sync_dir(dir) {
            warn!(path = %target.display(), error = %e, "directory sync failed after key publish");
        }

        Ok(true)
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let target = self.resolve(path)?;

        match fs::remove_file(&target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        assert_eq!(store.read(".keys/20250101_0000").unwrap(), None);
        assert!(store.write_if_missing(".keys/20250101_0000", b"key").unwrap());
        assert_eq!(store.read(".keys/20250101_0000").unwrap(), Some(b"key".to_vec()));

        assert!(store.delete(".keys/20250101_0000").unwrap());
        assert!(!store.delete(".keys/20250101_0000").unwrap());
    }

    #[test]
    fn second_write_does_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        assert!(store.write_if_missing(".keys/a", b"first").unwrap());
        assert!(!store.write_if_missing(".keys/a", b"second").unwrap());
        assert_eq!(store.read(".keys/a").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn losing_writer_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        store.write_if_missing(".keys/a", b"first").unwrap();
        store.write_if_missing(".keys/a", b"second").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join(".keys")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        for path in ["../outside", ".keys/../../outside", "/etc/passwd", ""] {
            assert!(
                matches!(store.read(path), Err(StoreError::InvalidPath { .. })),
                "{path:?} should be rejected"
            );
            assert!(matches!(
                store.write_if_missing(path, b"x"),
                Err(StoreError::InvalidPath { .. })
            ));
        }
    }

    #[test]
    fn concurrent_writers_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let store = store.clone();
                    scope.spawn(move || store.write_if_missing(".keys/race", &[i; 96]).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
        });

        assert_eq!(winners, 1);
        assert_eq!(store.read(".keys/race").unwrap().unwrap().len(), 96);
    }
}
