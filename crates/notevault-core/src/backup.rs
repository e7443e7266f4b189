//! Backup engine: export a vault into one password-protected archive.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::archive::{ArchiveWriter, AttachmentWrite};
use crate::crypto::{encrypt_backup, validate_backup_password};
use crate::error::{Result, VaultError};
use crate::fs::{commit_temp, create_temp_for};
use crate::repository::VaultRepository;
use crate::storage::RecordStore;

/// Counts from one export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub notes_exported: usize,
    pub files_exported: usize,
    /// Attachments that could not be read and are missing from the archive.
    pub files_skipped: usize,
    pub bytes_written: u64,
}

impl BackupReport {
    /// True when some attachments were left out.
    pub fn is_partial(&self) -> bool {
        self.files_skipped > 0
    }
}

/// Exports notes and attachments.
///
/// The export reads a snapshot of the note and attachment lists and then
/// streams each attachment. It does not take the repository's writer lock:
/// a mutation running concurrently may or may not be reflected, and an
/// attachment deleted mid-export is counted as skipped.
pub struct BackupEngine<'a, S: RecordStore> {
    repo: &'a VaultRepository<S>,
}

impl<'a, S: RecordStore> BackupEngine<'a, S> {
    pub fn new(repo: &'a VaultRepository<S>) -> Self {
        Self { repo }
    }

    /// Write an encrypted archive of the whole vault to `sink`.
    ///
    /// Fails with `WeakPassword` before reading anything when the password is
    /// too short.
    #[instrument(level = "info", skip_all)]
    pub fn export<W: Write>(&self, mut sink: W, password: &str) -> Result<BackupReport> {
        validate_backup_password(password)?;

        let notes = self.repo.list_notes()?;
        let files = self.repo.list_files()?;
        debug!(notes = notes.len(), files = files.len(), "Snapshot taken");

        let mut writer = ArchiveWriter::new();
        writer.write_notes(&notes)?;

        let mut report = BackupReport {
            notes_exported: notes.len(),
            ..Default::default()
        };
        for file in &files {
            let outcome = match self.repo.load_file(&file.file_id) {
                Ok(reader) => writer.add_file(file, reader)?,
                Err(e) => AttachmentWrite::Skipped(e),
            };
            match outcome {
                AttachmentWrite::Written => {
                    debug!(file_id = %file.file_id, "Added attachment to archive");
                    report.files_exported += 1;
                }
                AttachmentWrite::Skipped(e) => {
                    warn!(
                        file_id = %file.file_id,
                        name = %file.original_file_name,
                        error = %e,
                        "Skipping unreadable attachment"
                    );
                    report.files_skipped += 1;
                }
            }
        }

        let container = writer.finish()?;
        let encrypted = encrypt_backup(password, &container)?;
        sink.write_all(&encrypted)?;
        sink.flush()?;
        report.bytes_written = encrypted.len() as u64;

        info!(
            notes = report.notes_exported,
            files = report.files_exported,
            skipped = report.files_skipped,
            "Backup complete"
        );
        Ok(report)
    }

    /// Export to `destination`, replacing it only once the archive is
    /// complete. A failed backup leaves no file behind.
    pub fn run_backup(&self, destination: &Path, password: &str) -> Result<BackupReport> {
        validate_backup_password(password)?;
        if destination.is_dir() {
            return Err(VaultError::InvalidInput(format!(
                "{} is a directory",
                destination.display()
            )));
        }

        let (temp_path, mut file) = create_temp_for(destination)?;
        match self.export(&mut file, password) {
            Ok(report) => {
                commit_temp(&temp_path, file, destination)?;
                Ok(report)
            }
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobs::EnvelopeFileStore;
    use crate::crypto::{decrypt_backup, KeyMaterial};
    use crate::storage::{AgeSqliteStore, NoteDraft};
    use tempfile::tempdir;

    fn repo(dir: &Path) -> VaultRepository<AgeSqliteStore> {
        let key = KeyMaterial::generate().unwrap();
        let path = dir.join("vault.db.age");
        AgeSqliteStore::create(&path, &key).unwrap();
        VaultRepository::new(
            AgeSqliteStore::open(&path, &key).unwrap(),
            EnvelopeFileStore::open(dir.join("secure_files"), KeyMaterial::generate().unwrap())
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_weak_password_touches_nothing() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let dest = dir.path().join("backup.nvbak");
        let result = BackupEngine::new(&repo).run_backup(&dest, "12345");
        assert!(matches!(result, Err(VaultError::WeakPassword { min: 6 })));
        assert!(!dest.exists());
    }

    #[test]
    fn test_export_counts_and_decrypts() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save_note(&NoteDraft::new("n1", "c1")).unwrap();
        repo.upload_file(&b"0123456789"[..], "hello.txt", "").unwrap();

        let mut out = Vec::new();
        let report = BackupEngine::new(&repo).export(&mut out, "secret1").unwrap();
        assert_eq!(report.notes_exported, 1);
        assert_eq!(report.files_exported, 1);
        assert!(!report.is_partial());
        assert_eq!(report.bytes_written, out.len() as u64);

        let container = decrypt_backup(out.as_slice(), "secret1").unwrap();
        assert_eq!(&container[..2], b"PK");
    }

    #[test]
    fn test_unreadable_blob_is_skipped() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save_note(&NoteDraft::new("n", "")).unwrap();
        let good = repo.upload_file(&b"good"[..], "good.txt", "").unwrap();
        let bad = repo.upload_file(&b"bad bytes"[..], "bad.txt", "").unwrap();
        let gone = repo.upload_file(&b"gone"[..], "gone.txt", "").unwrap();

        let bad_path = repo.blobs().dir().join(&bad.file_id);
        let mut raw = std::fs::read(&bad_path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        std::fs::write(&bad_path, raw).unwrap();
        repo.blobs().delete(&gone.file_id).unwrap();

        let report = BackupEngine::new(&repo)
            .export(&mut Vec::new(), "secret1")
            .unwrap();
        assert_eq!(report.files_exported, 1);
        assert_eq!(report.files_skipped, 2);
        assert!(report.is_partial());
        assert!(repo.get_file(&good.file_id).unwrap().is_some());
    }

    #[test]
    fn test_run_backup_replaces_destination() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save_note(&NoteDraft::new("n", "")).unwrap();
        let dest = dir.path().join("backup.nvbak");
        std::fs::write(&dest, b"old").unwrap();

        BackupEngine::new(&repo).run_backup(&dest, "secret1").unwrap();
        let written = std::fs::read(&dest).unwrap();
        assert_ne!(written, b"old");
        assert!(decrypt_backup(written.as_slice(), "secret1").is_ok());
    }
}
