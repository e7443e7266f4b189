//! Age-encrypted SQLite record store.
//!
//! The database is held in memory. After every committed mutation it is
//! serialized, encrypted with age and written to disk atomically. If that
//! write fails the in-memory database is rolled back to the last persisted
//! state, so memory and disk never disagree.

mod row;

use std::fs;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::serialize::OwnedData;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Transaction};
use tracing::{debug, error};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::KeyMaterial;
use crate::error::{Result, VaultError};
use crate::fs::write_atomic;
use crate::storage::encryption::{decrypt, encrypt};
use crate::storage::traits::RecordStore;
use crate::storage::types::{
    FileMetadata, FileStats, NewFileMetadata, NewNote, Note, StoreMetadata,
};

use row::{FileRow, NoteRow, FILE_COLUMNS, NOTE_COLUMNS};

/// Current on-disk schema version.
pub const FORMAT_VERSION: &str = "1";

const SCHEMA: &str = r#"
    CREATE TABLE meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        last_modified INTEGER NOT NULL
    );

    CREATE INDEX notes_last_modified ON notes (last_modified);

    CREATE TABLE secure_files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_id TEXT NOT NULL UNIQUE,
        original_file_name TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        file_size INTEGER NOT NULL CHECK (file_size >= 0),
        upload_date INTEGER NOT NULL
    );

    CREATE INDEX secure_files_upload_date ON secure_files (upload_date);
"#;

/// Age-encrypted SQLite record store.
pub struct AgeSqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
    key: KeyMaterial,
    vault_id: Uuid,
}

impl std::fmt::Debug for AgeSqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgeSqliteStore")
            .field("path", &self.path)
            .field("vault_id", &self.vault_id)
            .finish_non_exhaustive()
    }
}

impl AgeSqliteStore {
    /// Path of the encrypted database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VaultError::Storage("SQLite connection poisoned".to_string()))
    }

    fn serialize_main(conn: &Connection) -> Result<Zeroizing<Vec<u8>>> {
        let data = conn.serialize(DatabaseName::Main)?;
        Ok(Zeroizing::new(data.as_ref().to_vec()))
    }

    fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
        if bytes.is_empty() {
            return Err(VaultError::Storage("SQLite payload is empty".to_string()));
        }

        let size: i32 = bytes
            .len()
            .try_into()
            .map_err(|_| VaultError::Storage("SQLite payload too large".to_string()))?;

        // SAFETY: sqlite3_malloc returns a valid pointer or null; null is
        // rejected below. `size` fits in i32 (checked above).
        let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| VaultError::Storage("SQLite allocation failed".to_string()))?;

        // SAFETY:
        // - `ptr` was allocated above with exactly `bytes.len()` bytes
        // - `bytes` is valid for reads of `bytes.len()` bytes
        // - the regions don't overlap: `ptr` is fresh heap memory
        // - `OwnedData::from_raw_nonnull` takes ownership of the sqlite3_malloc'd
        //   buffer, which SQLite frees when it is dropped or consumed
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
            Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
        }
    }

    fn load_into(conn: &mut Connection, plaintext: &[u8]) -> Result<()> {
        let owned_data = Self::owned_data_from_bytes(plaintext)?;
        conn.deserialize(DatabaseName::Main, owned_data, false)?;
        Ok(())
    }

    fn persist(&self, conn: &Connection) -> Result<()> {
        let plaintext = Self::serialize_main(conn)?;
        let encrypted = encrypt(&plaintext, self.key.to_passphrase())?;
        write_atomic(&self.path, &encrypted)
    }

    /// Run `op` in a transaction, commit, and persist.
    ///
    /// When persisting fails the connection is restored from a snapshot
    /// taken before the transaction began.
    fn mutate<T>(&self, op: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock_conn()?;
        let snapshot = Self::serialize_main(&conn)?;

        let tx = conn.transaction()?;
        let out = op(&tx)?;
        tx.execute(
            "UPDATE meta SET value = ? WHERE key = 'last_modified'",
            [Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        if let Err(e) = self.persist(&conn) {
            error!(error = %e, "Persisting record store failed, rolling back");
            Self::load_into(&mut conn, &snapshot)?;
            return Err(e);
        }
        Ok(out)
    }

    fn meta_value(conn: &Connection, key: &str) -> Result<String> {
        conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| VaultError::Storage(format!("Metadata missing key {}", key)))
    }

    fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(value)
            .map_err(|e| VaultError::Storage(format!("Invalid {} timestamp: {}", field, e)))?
            .with_timezone(&Utc))
    }

    fn insert_note_in(tx: &Transaction<'_>, note: &NewNote) -> Result<Note> {
        validate_title(&note.title)?;
        tx.execute(
            "INSERT INTO notes (title, content, last_modified) VALUES (?, ?, ?)",
            params![note.title, note.content, note.last_modified],
        )?;
        Ok(Note {
            id: tx.last_insert_rowid(),
            title: note.title.clone(),
            content: note.content.clone(),
            last_modified: note.last_modified,
        })
    }

    fn file_size_param(size: u64) -> Result<i64> {
        i64::try_from(size)
            .map_err(|_| VaultError::Validation(format!("File size {} too large", size)))
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(VaultError::Validation(
            "Note title cannot be empty".to_string(),
        ));
    }
    Ok(())
}

impl RecordStore for AgeSqliteStore {
    fn create(path: &Path, key: &KeyMaterial) -> Result<Uuid> {
        if path.exists() {
            return Err(VaultError::Storage(
                "Record store already exists".to_string(),
            ));
        }

        let vault_id = Uuid::new_v4();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        let created_at = Utc::now().to_rfc3339();
        let vault_id_str = vault_id.to_string();
        let meta: [(&str, &str); 4] = [
            ("format_version", FORMAT_VERSION),
            ("vault_id", &vault_id_str),
            ("created_at", &created_at),
            ("last_modified", &created_at),
        ];
        for (k, v) in meta {
            conn.execute("INSERT INTO meta (key, value) VALUES (?, ?)", [k, v])?;
        }

        let plaintext = Self::serialize_main(&conn)?;
        let encrypted = encrypt(&plaintext, key.to_passphrase())?;
        write_atomic(path, &encrypted)?;
        debug!(path = %path.display(), %vault_id, "Created record store");

        Ok(vault_id)
    }

    fn open(path: &Path, key: &KeyMaterial) -> Result<Self> {
        if !path.exists() {
            return Err(VaultError::NotFound(format!(
                "Record store {}",
                path.display()
            )));
        }

        let encrypted = fs::read(path)?;
        let plaintext = decrypt(&encrypted, key.to_passphrase())?;
        let mut conn = Connection::open_in_memory()?;
        Self::load_into(&mut conn, &plaintext)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let format_version = Self::meta_value(&conn, "format_version")?;
        if format_version != FORMAT_VERSION {
            return Err(VaultError::Storage(format!(
                "Unsupported record store format {}",
                format_version
            )));
        }
        let vault_id_str = Self::meta_value(&conn, "vault_id")?;
        let vault_id = Uuid::parse_str(&vault_id_str)
            .map_err(|e| VaultError::Storage(format!("Invalid vault_id in metadata: {}", e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            key: key.clone(),
            vault_id,
        })
    }

    fn metadata(&self) -> Result<StoreMetadata> {
        let conn = self.lock_conn()?;

        let format_version = Self::meta_value(&conn, "format_version")?;
        let created_at =
            Self::parse_timestamp(&Self::meta_value(&conn, "created_at")?, "created_at")?;
        let last_modified =
            Self::parse_timestamp(&Self::meta_value(&conn, "last_modified")?, "last_modified")?;

        Ok(StoreMetadata {
            format_version,
            vault_id: self.vault_id,
            created_at,
            last_modified,
        })
    }

    fn insert_note(&self, note: &NewNote) -> Result<Note> {
        self.mutate(|tx| Self::insert_note_in(tx, note))
    }

    fn insert_notes(&self, notes: &[NewNote]) -> Result<usize> {
        if notes.is_empty() {
            return Ok(0);
        }
        self.mutate(|tx| {
            for note in notes {
                Self::insert_note_in(tx, note)?;
            }
            Ok(notes.len())
        })
    }

    fn update_note(
        &self,
        id: i64,
        title: &str,
        content: &str,
        last_modified: i64,
    ) -> Result<Note> {
        validate_title(title)?;
        self.mutate(|tx| {
            let changed = tx.execute(
                "UPDATE notes SET title = ?, content = ?, last_modified = ? WHERE id = ?",
                params![title, content, last_modified, id],
            )?;
            if changed == 0 {
                return Err(VaultError::NotFound(format!("Note {}", id)));
            }
            Ok(Note {
                id,
                title: title.to_string(),
                content: content.to_string(),
                last_modified,
            })
        })
    }

    fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM notes WHERE id = ?", NOTE_COLUMNS),
                [id],
                NoteRow::from_row,
            )
            .optional()?;
        Ok(row.map(Note::from))
    }

    fn delete_note(&self, id: i64) -> Result<bool> {
        {
            let conn = self.lock_conn()?;
            let exists: Option<i64> = conn
                .query_row("SELECT id FROM notes WHERE id = ?", [id], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(false);
            }
        }
        self.mutate(|tx| Ok(tx.execute("DELETE FROM notes WHERE id = ?", [id])? > 0))
    }

    fn list_notes(&self) -> Result<Vec<Note>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes ORDER BY last_modified DESC, id DESC",
            NOTE_COLUMNS
        ))?;
        let rows = stmt.query_map([], NoteRow::from_row)?;
        let mut notes = Vec::new();
        for row in rows {
            notes.push(Note::from(row?));
        }
        Ok(notes)
    }

    fn insert_file(&self, file: &NewFileMetadata) -> Result<FileMetadata> {
        let file_size = Self::file_size_param(file.file_size)?;
        self.mutate(|tx| {
            let duplicate: Option<i64> = tx
                .query_row(
                    "SELECT id FROM secure_files WHERE file_id = ?",
                    [&file.file_id],
                    |row| row.get(0),
                )
                .optional()?;
            if duplicate.is_some() {
                return Err(VaultError::Validation(format!(
                    "File id {} already exists",
                    file.file_id
                )));
            }

            tx.execute(
                "INSERT INTO secure_files (file_id, original_file_name, mime_type, file_size, upload_date) VALUES (?, ?, ?, ?, ?)",
                params![
                    file.file_id,
                    file.original_file_name,
                    file.mime_type,
                    file_size,
                    file.upload_date
                ],
            )?;
            Ok(FileMetadata {
                id: tx.last_insert_rowid(),
                file_id: file.file_id.clone(),
                original_file_name: file.original_file_name.clone(),
                mime_type: file.mime_type.clone(),
                file_size: file.file_size,
                upload_date: file.upload_date,
            })
        })
    }

    fn get_file(&self, file_id: &str) -> Result<Option<FileMetadata>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM secure_files WHERE file_id = ?", FILE_COLUMNS),
                [file_id],
                FileRow::from_row,
            )
            .optional()?;
        row.map(FileMetadata::try_from).transpose()
    }

    fn delete_file(&self, file_id: &str) -> Result<bool> {
        {
            let conn = self.lock_conn()?;
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM secure_files WHERE file_id = ?",
                    [file_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(false);
            }
        }
        self.mutate(|tx| {
            Ok(tx.execute("DELETE FROM secure_files WHERE file_id = ?", [file_id])? > 0)
        })
    }

    fn list_files(&self) -> Result<Vec<FileMetadata>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM secure_files ORDER BY upload_date DESC, id DESC",
            FILE_COLUMNS
        ))?;
        let rows = stmt.query_map([], FileRow::from_row)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(FileMetadata::try_from(row?)?);
        }
        Ok(files)
    }

    fn file_stats(&self) -> Result<FileStats> {
        let conn = self.lock_conn()?;
        let (count, total): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM secure_files",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(FileStats {
            count: u64::try_from(count).unwrap_or(0),
            total_size: u64::try_from(total).unwrap_or(0),
        })
    }

    fn check_integrity(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        let status: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if status != "ok" {
            return Err(VaultError::Storage(format!(
                "SQLite integrity check failed: {}",
                status
            )));
        }

        let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        if rows.next()?.is_some() {
            return Err(VaultError::Storage(
                "Foreign key integrity check failed".to_string(),
            ));
        }

        let metadata_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM meta WHERE key IN ('format_version', 'vault_id', 'created_at', 'last_modified')",
            [],
            |row| row.get(0),
        )?;
        if metadata_count < 4 {
            return Err(VaultError::Storage(
                "Metadata table missing required keys".to_string(),
            ));
        }

        let empty_titles: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE trim(title) = ''",
            [],
            |row| row.get(0),
        )?;
        if empty_titles > 0 {
            return Err(VaultError::Storage(format!(
                "{} notes have an empty title",
                empty_titles
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_store(dir: &Path) -> (AgeSqliteStore, KeyMaterial) {
        let key = KeyMaterial::generate().unwrap();
        let path = dir.join("vault.db.age");
        AgeSqliteStore::create(&path, &key).unwrap();
        (AgeSqliteStore::open(&path, &key).unwrap(), key)
    }

    fn note(title: &str, ts: i64) -> NewNote {
        NewNote {
            title: title.to_string(),
            content: format!("{} body", title),
            last_modified: ts,
        }
    }

    fn file(file_id: &str, size: u64, uploaded: i64) -> NewFileMetadata {
        NewFileMetadata {
            file_id: file_id.to_string(),
            original_file_name: "hello.txt".to_string(),
            mime_type: "text/plain".to_string(),
            file_size: size,
            upload_date: uploaded,
        }
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempdir().unwrap();
        let key = KeyMaterial::generate().unwrap();
        let path = dir.path().join("vault.db.age");
        AgeSqliteStore::create(&path, &key).unwrap();
        assert!(AgeSqliteStore::create(&path, &key).is_err());
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let key = KeyMaterial::generate().unwrap();
        let result = AgeSqliteStore::open(&dir.path().join("nope.age"), &key);
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        let other = KeyMaterial::generate().unwrap();
        let result = AgeSqliteStore::open(store.path(), &other);
        assert!(matches!(result, Err(VaultError::IncorrectPassphrase)));
    }

    #[test]
    fn test_metadata_reports_vault_id() {
        let dir = tempdir().unwrap();
        let key = KeyMaterial::generate().unwrap();
        let path = dir.path().join("vault.db.age");
        let vault_id = AgeSqliteStore::create(&path, &key).unwrap();
        let store = AgeSqliteStore::open(&path, &key).unwrap();
        let meta = store.metadata().unwrap();
        assert_eq!(meta.vault_id, vault_id);
        assert_eq!(meta.format_version, FORMAT_VERSION);
        assert!(meta.last_modified >= meta.created_at);
    }

    #[test]
    fn test_mutations_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let (store, key) = new_store(dir.path());
        let first = store.insert_note(&note("first", 1_000)).unwrap();
        store.insert_note(&note("second", 2_000)).unwrap();
        store
            .update_note(first.id, "first edited", "", 3_000)
            .unwrap();
        store
            .insert_file(&file("6f9619ff-8b86-4011-b42d-00c04fc964ff", 10, 5))
            .unwrap();

        let reopened = AgeSqliteStore::open(store.path(), &key).unwrap();
        let notes = reopened.list_notes().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].title, "first edited");
        assert_eq!(notes[0].content, "");
        assert_eq!(notes[1].title, "second");
        assert_eq!(reopened.file_stats().unwrap(), FileStats { count: 1, total_size: 10 });
    }

    #[test]
    fn test_empty_title_rejected() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        assert!(matches!(
            store.insert_note(&note("   ", 1)),
            Err(VaultError::Validation(_))
        ));
        assert!(store.list_notes().unwrap().is_empty());
    }

    #[test]
    fn test_update_unknown_note_is_not_found() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        assert!(matches!(
            store.update_note(42, "t", "c", 1),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_note_reports_presence() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        let created = store.insert_note(&note("gone", 1)).unwrap();
        assert!(store.delete_note(created.id).unwrap());
        assert!(!store.delete_note(created.id).unwrap());
        assert!(store.get_note(created.id).unwrap().is_none());
    }

    #[test]
    fn test_insert_notes_is_all_or_nothing() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        let batch = vec![note("ok", 1), note("", 2), note("never", 3)];
        assert!(store.insert_notes(&batch).is_err());
        assert!(store.list_notes().unwrap().is_empty());

        let good = vec![note("a", 1), note("b", 2)];
        assert_eq!(store.insert_notes(&good).unwrap(), 2);
        assert_eq!(store.list_notes().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_file_id_rejected() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        let id = "6f9619ff-8b86-4011-b42d-00c04fc964ff";
        store.insert_file(&file(id, 1, 1)).unwrap();
        assert!(matches!(
            store.insert_file(&file(id, 2, 2)),
            Err(VaultError::Validation(_))
        ));
        assert_eq!(store.list_files().unwrap().len(), 1);
    }

    #[test]
    fn test_files_listed_newest_first() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        store
            .insert_file(&file("00000000-0000-4000-8000-000000000001", 1, 10))
            .unwrap();
        store
            .insert_file(&file("00000000-0000-4000-8000-000000000002", 2, 20))
            .unwrap();
        let files = store.list_files().unwrap();
        assert_eq!(files[0].upload_date, 20);
        assert_eq!(files[1].upload_date, 10);

        assert!(store
            .delete_file("00000000-0000-4000-8000-000000000001")
            .unwrap());
        assert!(store
            .get_file("00000000-0000-4000-8000-000000000001")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_failed_persist_rolls_back_memory() {
        let dir = tempdir().unwrap();
        let vault_dir = dir.path().join("vault");
        fs::create_dir(&vault_dir).unwrap();
        let (store, _) = new_store(&vault_dir);
        store.insert_note(&note("kept", 1)).unwrap();

        // Removing the directory makes the atomic write fail
        fs::remove_dir_all(&vault_dir).unwrap();
        assert!(store.insert_note(&note("lost", 2)).is_err());

        let titles: Vec<_> = store
            .list_notes()
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["kept".to_string()]);
    }

    #[test]
    fn test_check_integrity_passes_on_fresh_store() {
        let dir = tempdir().unwrap();
        let (store, _) = new_store(dir.path());
        store.insert_note(&note("n", 1)).unwrap();
        store.check_integrity().unwrap();
    }
}
