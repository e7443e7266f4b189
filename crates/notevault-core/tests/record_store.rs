use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use notevault_core::crypto::KeyMaterial;
use notevault_core::storage::{AgeSqliteStore, NewFileMetadata, NewNote, RecordStore};
use notevault_core::VaultError;

struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be available")
            .as_nanos();
        let filename = format!("{}_{}_{}.db.age", prefix, std::process::id(), nanos);
        let path = std::env::temp_dir().join(filename);
        Self { path }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[test]
fn test_create_open_round_trip() {
    let temp = TempFile::new("notevault_store_round_trip");
    let key = KeyMaterial::generate().expect("key generation should succeed");

    let vault_id = AgeSqliteStore::create(&temp.path, &key).expect("create should succeed");
    assert!(!vault_id.is_nil());
    assert!(temp.path.exists());

    let store = AgeSqliteStore::open(&temp.path, &key).expect("open should succeed");
    assert_eq!(store.metadata().expect("metadata").vault_id, vault_id);

    let on_disk = fs::read(&temp.path).expect("read should succeed");
    assert!(on_disk.starts_with(b"age-encryption.org/v1"));
}

#[test]
fn test_open_wrong_key_fails() {
    let temp = TempFile::new("notevault_store_wrong_key");
    let key = KeyMaterial::generate().expect("key generation should succeed");
    let other = KeyMaterial::generate().expect("key generation should succeed");

    AgeSqliteStore::create(&temp.path, &key).expect("create should succeed");

    let result = AgeSqliteStore::open(&temp.path, &other);
    assert!(matches!(result, Err(VaultError::IncorrectPassphrase)));
}

#[test]
fn test_open_missing_file_fails() {
    let temp = TempFile::new("notevault_store_missing");
    let key = KeyMaterial::generate().expect("key generation should succeed");

    let result = AgeSqliteStore::open(&temp.path, &key);
    assert!(matches!(result, Err(VaultError::NotFound(_))));
}

#[test]
fn test_mutations_survive_reopen() {
    let temp = TempFile::new("notevault_store_persist");
    let key = KeyMaterial::generate().expect("key generation should succeed");
    AgeSqliteStore::create(&temp.path, &key).expect("create should succeed");

    {
        let store = AgeSqliteStore::open(&temp.path, &key).expect("open should succeed");
        store
            .insert_note(&NewNote {
                title: "Persisted".to_string(),
                content: "still here".to_string(),
                last_modified: 10,
            })
            .expect("insert note");
        store
            .insert_file(&NewFileMetadata {
                file_id: "0b7c8f3e-9c1d-4c1a-9f0e-2d6a5b4c3d21".to_string(),
                original_file_name: "scan.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                file_size: 2048,
                upload_date: 11,
            })
            .expect("insert file");
    }

    let store = AgeSqliteStore::open(&temp.path, &key).expect("reopen should succeed");
    let notes = store.list_notes().expect("list notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "still here");
    let stats = store.file_stats().expect("file stats");
    assert_eq!((stats.count, stats.total_size), (1, 2048));
    store.check_integrity().expect("integrity check should pass");
}
