//! Keys written through the durable stores survive a restart
//!
//! Each test protects payloads with one instance, drops it together with its
//! store handle, reopens the store and checks that a fresh instance (empty
//! cache) still opens the payloads.

use epochkms_core::{KeyStore, Kms, KmsConfig};
use epochkms_runtime::{BackendKind, FsStore, RedbStore, StoreBackend, SystemEnv};
use tempfile::tempdir;

fn kms<S: KeyStore>(store: S) -> Kms<S, SystemEnv> {
    Kms::new(store, SystemEnv::new(), &KmsConfig::default()).unwrap()
}

#[test]
fn fs_store_survives_reopen() {
    let dir = tempdir().unwrap();

    let (sealed, signed) = {
        let kms = kms(FsStore::open(dir.path()).unwrap());
        (kms.encrypt(b"before restart").unwrap(), kms.sign_text(b"signed").unwrap())
    };

    let kms = kms(FsStore::open(dir.path()).unwrap());
    assert!(kms.keys().cache().is_empty());
    assert_eq!(kms.decrypt(&sealed).unwrap(), b"before restart");
    assert_eq!(kms.verify_text(&signed).unwrap(), b"signed");
}

#[test]
fn redb_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("keys.redb");

    let sealed = {
        let kms = kms(RedbStore::open(&file).unwrap());
        kms.encrypt_text(b"before restart").unwrap()
    };

    let kms = kms(RedbStore::open(&file).unwrap());
    assert_eq!(kms.decrypt_text(&sealed).unwrap(), b"before restart");
}

#[test]
fn reopened_instance_reuses_stored_key() {
    let dir = tempdir().unwrap();

    for kind in [BackendKind::Fs, BackendKind::Redb] {
        let location = dir.path().join(format!("{kind:?}"));
        std::fs::create_dir_all(&location).unwrap();

        let first = {
            let store = StoreBackend::open(kind, &location).unwrap();
            let kms = kms(store.clone());
            kms.encrypt(b"x").unwrap();
            store.read(&kms.keys().storage_path(&kms.current_key_id())).unwrap()
        };

        let store = StoreBackend::open(kind, &location).unwrap();
        let kms = kms(store.clone());
        kms.encrypt(b"y").unwrap();
        let second = store.read(&kms.keys().storage_path(&kms.current_key_id())).unwrap();

        assert!(first.is_some(), "{kind:?} stored no key");
        assert_eq!(first, second, "{kind:?} replaced the stored key");
    }
}

#[test]
fn separate_fs_handles_share_keys() {
    let dir = tempdir().unwrap();
    let writer = kms(FsStore::open(dir.path()).unwrap());
    let reader = kms(FsStore::open(dir.path()).unwrap());

    let signed = writer.sign(b"shared directory").unwrap();
    assert_eq!(reader.verify(&signed).unwrap(), b"shared directory");
}
