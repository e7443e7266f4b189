//! Vault repository: coordinates the blob store and the record store.
//!
//! Every mutation runs under one writer lock, so mutations are applied in a
//! single order per repository instance. Reads go straight to the stores.
//! Two repositories over the same directory are not coordinated with each
//! other.
//!
//! Observers subscribe to `watch` channels that are refreshed after each
//! successful mutation.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::blobs::{BlobReader, EnvelopeFileStore};
use crate::error::{Result, VaultError};
use crate::mime::guess_mime_type;
use crate::storage::{
    now_millis, FileMetadata, FileStats, NewFileMetadata, NewNote, Note, NoteDraft,
    RecordStore,
};

/// Temp files younger than this may belong to a write still in progress.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// What a repair pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Blobs with no metadata row, now deleted.
    pub orphan_blobs_removed: Vec<String>,
    /// Metadata rows whose blob is missing. Left in place; loading them
    /// answers `NotFound`.
    pub rows_missing_blob: Vec<String>,
    /// Leftovers of interrupted blob writes, now deleted.
    pub temp_files_removed: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_blobs_removed.is_empty()
            && self.rows_missing_blob.is_empty()
            && self.temp_files_removed == 0
    }
}

/// Result of a read-only consistency check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub orphan_blobs: Vec<String>,
    pub rows_missing_blob: Vec<String>,
    /// Rows whose recorded size disagrees with the blob.
    pub size_mismatches: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_blobs.is_empty()
            && self.rows_missing_blob.is_empty()
            && self.size_mismatches.is_empty()
    }
}

/// Notes and attachments of one vault.
pub struct VaultRepository<S: RecordStore> {
    records: S,
    blobs: EnvelopeFileStore,
    writer: Mutex<()>,
    notes_tx: watch::Sender<Vec<Note>>,
    files_tx: watch::Sender<Vec<FileMetadata>>,
    stats_tx: watch::Sender<FileStats>,
}

impl<S: RecordStore> VaultRepository<S> {
    /// Build a repository over already-open stores.
    pub fn new(records: S, blobs: EnvelopeFileStore) -> Result<Self> {
        let notes = records.list_notes()?;
        let files = records.list_files()?;
        let stats = records.file_stats()?;
        Ok(Self {
            records,
            blobs,
            writer: Mutex::new(()),
            notes_tx: watch::channel(notes).0,
            files_tx: watch::channel(files).0,
            stats_tx: watch::channel(stats).0,
        })
    }

    pub fn records(&self) -> &S {
        &self.records
    }

    pub fn blobs(&self) -> &EnvelopeFileStore {
        &self.blobs
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| VaultError::Storage("Repository writer lock poisoned".to_string()))
    }

    fn publish_notes(&self) -> Result<()> {
        self.notes_tx.send_replace(self.records.list_notes()?);
        Ok(())
    }

    fn publish_files(&self) -> Result<()> {
        self.files_tx.send_replace(self.records.list_files()?);
        self.stats_tx.send_replace(self.records.file_stats()?);
        Ok(())
    }

    // --- Notes ---

    /// Create (no id) or update (with id) a note. `last_modified` is set to
    /// now either way.
    pub fn save_note(&self, draft: &NoteDraft) -> Result<Note> {
        if draft.title.trim().is_empty() {
            return Err(VaultError::Validation(
                "Note title cannot be empty".to_string(),
            ));
        }
        let _guard = self.lock_writer()?;
        let now = now_millis();
        let note = match draft.id {
            None => self.records.insert_note(&NewNote {
                title: draft.title.clone(),
                content: draft.content.clone(),
                last_modified: now,
            })?,
            Some(id) => self
                .records
                .update_note(id, &draft.title, &draft.content, now)?,
        };
        debug!(id = note.id, "Saved note");
        self.publish_notes()?;
        Ok(note)
    }

    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        self.records.get_note(id)
    }

    /// Delete a note. Returns whether it existed.
    pub fn delete_note(&self, id: i64) -> Result<bool> {
        let _guard = self.lock_writer()?;
        let removed = self.records.delete_note(id)?;
        if removed {
            self.publish_notes()?;
        }
        Ok(removed)
    }

    /// All notes, newest first.
    pub fn list_notes(&self) -> Result<Vec<Note>> {
        self.records.list_notes()
    }

    pub fn subscribe_notes(&self) -> watch::Receiver<Vec<Note>> {
        self.notes_tx.subscribe()
    }

    /// Insert notes from an archive in one transaction.
    pub fn import_notes(&self, notes: &[NewNote]) -> Result<usize> {
        let _guard = self.lock_writer()?;
        let count = self.records.insert_notes(notes)?;
        if count > 0 {
            self.publish_notes()?;
        }
        Ok(count)
    }

    // --- Attachments ---

    /// Encrypt `source` into a new blob and record its metadata.
    ///
    /// An empty `mime_type` is guessed from the file name. If recording the
    /// metadata fails the blob is deleted again.
    #[instrument(level = "debug", skip(self, source))]
    pub fn upload_file<R: Read>(
        &self,
        source: R,
        original_file_name: &str,
        mime_type: &str,
    ) -> Result<FileMetadata> {
        if original_file_name.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "File name cannot be empty".to_string(),
            ));
        }
        let mime_type = if mime_type.trim().is_empty() {
            guess_mime_type(original_file_name)
        } else {
            mime_type
        };

        let _guard = self.lock_writer()?;
        let stored = self.blobs.put(source, original_file_name)?;
        let inserted = self.records.insert_file(&NewFileMetadata {
            file_id: stored.file_id.clone(),
            original_file_name: original_file_name.to_string(),
            mime_type: mime_type.to_string(),
            file_size: stored.size,
            upload_date: now_millis(),
        });

        let metadata = match inserted {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(file_id = %stored.file_id, error = %e, "Metadata insert failed, removing blob");
                if let Err(cleanup) = self.blobs.delete(&stored.file_id) {
                    warn!(file_id = %stored.file_id, error = %cleanup, "Blob cleanup failed");
                }
                return Err(e);
            }
        };
        info!(file_id = %metadata.file_id, size = metadata.file_size, "Uploaded file");
        self.publish_files()?;
        Ok(metadata)
    }

    /// Open an attachment for reading. `NotFound` when the blob is gone, even
    /// if its metadata row is still present.
    pub fn load_file(&self, file_id: &str) -> Result<BlobReader<BufReader<File>>> {
        self.blobs.get(file_id)
    }

    /// Decrypt a whole attachment into memory.
    pub fn read_file(&self, file_id: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.blobs.read_all(file_id)
    }

    pub fn get_file(&self, file_id: &str) -> Result<Option<FileMetadata>> {
        self.records.get_file(file_id)
    }

    /// Delete an attachment: blob first, then the row.
    pub fn delete_file(&self, metadata: &FileMetadata) -> Result<()> {
        let _guard = self.lock_writer()?;
        self.blobs.delete(&metadata.file_id)?;
        self.records.delete_file(&metadata.file_id)?;
        debug!(file_id = %metadata.file_id, "Deleted file");
        self.publish_files()
    }

    /// All attachments, newest first.
    pub fn list_files(&self) -> Result<Vec<FileMetadata>> {
        self.records.list_files()
    }

    pub fn subscribe_files(&self) -> watch::Receiver<Vec<FileMetadata>> {
        self.files_tx.subscribe()
    }

    pub fn file_stats(&self) -> Result<FileStats> {
        self.records.file_stats()
    }

    pub fn file_count(&self) -> Result<u64> {
        Ok(self.records.file_stats()?.count)
    }

    pub fn total_file_size(&self) -> Result<u64> {
        Ok(self.records.file_stats()?.total_size)
    }

    pub fn subscribe_file_stats(&self) -> watch::Receiver<FileStats> {
        self.stats_tx.subscribe()
    }

    // --- Maintenance ---

    /// Delete blobs nobody references and temp files older than
    /// [`STALE_TEMP_AGE`], and report rows whose blob is gone.
    pub fn repair(&self) -> Result<RepairReport> {
        let _guard = self.lock_writer()?;
        let rows: HashSet<String> = self
            .records
            .list_files()?
            .into_iter()
            .map(|f| f.file_id)
            .collect();
        let blobs: HashSet<String> = self.blobs.list_file_ids()?.into_iter().collect();

        let mut report = RepairReport::default();
        for orphan in blobs.difference(&rows) {
            warn!(file_id = %orphan, "Removing orphan blob");
            self.blobs.delete(orphan)?;
            report.orphan_blobs_removed.push(orphan.clone());
        }
        for missing in rows.difference(&blobs) {
            warn!(file_id = %missing, "Attachment row has no blob");
            report.rows_missing_blob.push(missing.clone());
        }
        report.temp_files_removed = self.blobs.remove_stale_temp_files(STALE_TEMP_AGE)?;
        if report.temp_files_removed > 0 {
            warn!(count = report.temp_files_removed, "Removed stale temp files");
        }
        report.orphan_blobs_removed.sort();
        report.rows_missing_blob.sort();
        Ok(report)
    }

    /// Check the record store and cross-check rows against blobs without
    /// changing anything.
    pub fn check_integrity(&self) -> Result<IntegrityReport> {
        self.records.check_integrity()?;

        let files = self.records.list_files()?;
        let blobs: HashSet<String> = self.blobs.list_file_ids()?.into_iter().collect();
        let mut report = IntegrityReport::default();
        let mut referenced = HashSet::new();

        for file in &files {
            referenced.insert(file.file_id.clone());
            match self.blobs.size(&file.file_id) {
                Ok(Some(size)) if size == file.file_size => {}
                Ok(Some(_)) | Err(VaultError::Integrity(_)) => {
                    report.size_mismatches.push(file.file_id.clone())
                }
                Ok(None) => report.rows_missing_blob.push(file.file_id.clone()),
                Err(e) => return Err(e),
            }
        }
        report.orphan_blobs = blobs.difference(&referenced).cloned().collect();
        report.orphan_blobs.sort();
        Ok(report)
    }
}
