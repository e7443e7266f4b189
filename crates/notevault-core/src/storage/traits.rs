//! Record store trait definition.
//!
//! The `RecordStore` trait is the seam between the vault repository and the
//! encrypted relational backend holding notes and attachment metadata.

use std::path::Path;
use uuid::Uuid;

use super::types::{FileMetadata, FileStats, NewFileMetadata, NewNote, Note, StoreMetadata};
use crate::crypto::KeyMaterial;
use crate::error::Result;

/// Encrypted store of notes and attachment metadata.
///
/// All implementations must ensure:
/// - Data is encrypted at rest
/// - Every successful mutation is durable before it returns
/// - A failed mutation leaves neither memory nor disk changed
///
/// Methods take `&self`; implementations synchronize internally.
pub trait RecordStore: Send + Sync {
    /// Create a new, empty store at `path`.
    ///
    /// # Returns
    ///
    /// Returns the vault id recorded in the store metadata.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Storage` if the file already exists or cannot be
    /// written.
    fn create(path: &Path, key: &KeyMaterial) -> Result<Uuid>
    where
        Self: Sized;

    /// Open an existing store.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::IncorrectPassphrase` if `key` does not decrypt the
    /// store, `VaultError::NotFound` if there is no store at `path`.
    fn open(path: &Path, key: &KeyMaterial) -> Result<Self>
    where
        Self: Sized;

    /// Get store metadata.
    fn metadata(&self) -> Result<StoreMetadata>;

    // --- Notes ---

    /// Insert a note and return it with its assigned id.
    fn insert_note(&self, note: &NewNote) -> Result<Note>;

    /// Insert many notes in one transaction. Either all are stored or none.
    fn insert_notes(&self, notes: &[NewNote]) -> Result<usize>;

    /// Replace title and content of an existing note.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::NotFound` if no note has this id.
    fn update_note(&self, id: i64, title: &str, content: &str, last_modified: i64)
        -> Result<Note>;

    /// Get a note by id. `Ok(None)` if not found.
    fn get_note(&self, id: i64) -> Result<Option<Note>>;

    /// Delete a note. Returns whether a row was removed.
    fn delete_note(&self, id: i64) -> Result<bool>;

    /// All notes, most recently modified first.
    fn list_notes(&self) -> Result<Vec<Note>>;

    // --- Attachment metadata ---

    /// Insert a metadata row.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Validation` if `file_id` is already present.
    fn insert_file(&self, file: &NewFileMetadata) -> Result<FileMetadata>;

    /// Get metadata by blob id. `Ok(None)` if not found.
    fn get_file(&self, file_id: &str) -> Result<Option<FileMetadata>>;

    /// Delete metadata by blob id. Returns whether a row was removed.
    fn delete_file(&self, file_id: &str) -> Result<bool>;

    /// All attachments, most recently uploaded first.
    fn list_files(&self) -> Result<Vec<FileMetadata>>;

    /// Count and total plaintext size of all attachments.
    fn file_stats(&self) -> Result<FileStats>;

    // --- Maintenance ---

    /// Run integrity checks on the store.
    fn check_integrity(&self) -> Result<()>;
}
