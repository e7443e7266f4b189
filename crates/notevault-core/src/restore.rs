//! Restore engine: import a password-protected archive into a vault.
//!
//! The container is decrypted and fully parsed before anything is written.
//! Notes are then inserted in one transaction; attachments follow one by one
//! and a failing attachment is counted rather than aborting the import.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::archive::parse_archive;
use crate::crypto::{decrypt_backup, validate_backup_password};
use crate::error::{Result, VaultError};
use crate::repository::VaultRepository;
use crate::storage::{NewNote, RecordStore};

/// Title given to archived notes whose title is blank.
pub const UNTITLED: &str = "Untitled";

/// Counts from one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub notes_imported: usize,
    pub files_imported: usize,
    /// Attachments that were damaged or could not be stored.
    pub files_failed: usize,
}

impl RestoreReport {
    pub fn is_partial(&self) -> bool {
        self.files_failed > 0
    }
}

pub struct RestoreEngine<'a, S: RecordStore> {
    repo: &'a VaultRepository<S>,
}

impl<'a, S: RecordStore> RestoreEngine<'a, S> {
    pub fn new(repo: &'a VaultRepository<S>) -> Self {
        Self { repo }
    }

    /// Decrypt `source` and add its notes and attachments to the vault.
    ///
    /// Every note becomes a new note; ids from the archive are not reused
    /// and nothing is de-duplicated against existing content.
    #[instrument(level = "info", skip_all)]
    pub fn import<R: Read>(&self, source: R, password: &str) -> Result<RestoreReport> {
        validate_backup_password(password)?;

        let container = decrypt_backup(source, password)?;
        let parsed = parse_archive(&container)?;
        drop(container);
        if parsed.notes.is_empty() {
            return Err(VaultError::CorruptArchive(
                "Archive contains no notes".to_string(),
            ));
        }
        if parsed.legacy {
            debug!("Archive has no file manifest, using legacy layout");
        }

        let notes: Vec<NewNote> = parsed
            .notes
            .into_iter()
            .map(|archived| {
                let mut note = NewNote::from(archived);
                if note.title.trim().is_empty() {
                    note.title = UNTITLED.to_string();
                }
                note
            })
            .collect();
        let mut report = RestoreReport {
            notes_imported: self.repo.import_notes(&notes)?,
            ..Default::default()
        };
        debug!(notes = report.notes_imported, "Notes imported");

        for attachment in parsed.attachments {
            if let Some(problem) = &attachment.problem {
                warn!(
                    source_id = %attachment.source_id,
                    name = %attachment.original_file_name,
                    problem = %problem,
                    "Skipping damaged attachment"
                );
                report.files_failed += 1;
                continue;
            }
            match self.repo.upload_file(
                attachment.data.as_slice(),
                &attachment.original_file_name,
                &attachment.mime_type,
            ) {
                Ok(metadata) => {
                    debug!(
                        source_id = %attachment.source_id,
                        file_id = %metadata.file_id,
                        "Attachment restored"
                    );
                    report.files_imported += 1;
                }
                Err(e) => {
                    warn!(
                        source_id = %attachment.source_id,
                        name = %attachment.original_file_name,
                        error = %e,
                        "Failed to restore attachment"
                    );
                    report.files_failed += 1;
                }
            }
        }

        info!(
            notes = report.notes_imported,
            files = report.files_imported,
            failed = report.files_failed,
            "Restore complete"
        );
        Ok(report)
    }

    /// Import the archive stored at `path`.
    pub fn run_restore(&self, path: &Path, password: &str) -> Result<RestoreReport> {
        validate_backup_password(password)?;
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound(format!(
                    "Backup file {}",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        self.import(BufReader::new(file), password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveWriter;
    use crate::backup::BackupEngine;
    use crate::blobs::EnvelopeFileStore;
    use crate::crypto::{encrypt_backup, KeyMaterial};
    use crate::storage::{AgeSqliteStore, Note, NoteDraft};
    use tempfile::tempdir;

    fn repo(dir: &Path) -> VaultRepository<AgeSqliteStore> {
        std::fs::create_dir_all(dir).unwrap();
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
    fn test_weak_password_rejected_first() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let result = RestoreEngine::new(&repo).import(&b"not even an archive"[..], "abc");
        assert!(matches!(result, Err(VaultError::WeakPassword { .. })));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let result = RestoreEngine::new(&repo).run_restore(&dir.path().join("nope"), "secret1");
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_wrong_password_imports_nothing() {
        let dir = tempdir().unwrap();
        let source = repo(&dir.path().join("a"));
        source.save_note(&NoteDraft::new("n", "c")).unwrap();
        let mut backup = Vec::new();
        BackupEngine::new(&source).export(&mut backup, "secret1").unwrap();

        let target = repo(&dir.path().join("b"));
        let result = RestoreEngine::new(&target).import(backup.as_slice(), "secret2");
        assert!(matches!(result, Err(VaultError::CorruptArchive(_))));
        assert!(target.list_notes().unwrap().is_empty());
    }

    #[test]
    fn test_empty_archive_is_a_failure() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let mut writer = ArchiveWriter::new();
        writer.write_notes(&[]).unwrap();
        let backup = encrypt_backup("secret1", &writer.finish().unwrap()).unwrap();

        let result = RestoreEngine::new(&repo).import(backup.as_slice(), "secret1");
        assert!(matches!(result, Err(VaultError::CorruptArchive(_))));
        assert!(repo.list_notes().unwrap().is_empty());
    }

    #[test]
    fn test_blank_title_becomes_untitled() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let mut writer = ArchiveWriter::new();
        writer
            .write_notes(&[Note {
                id: 4,
                title: "   ".to_string(),
                content: "body".to_string(),
                last_modified: 42,
            }])
            .unwrap();
        let backup = encrypt_backup("secret1", &writer.finish().unwrap()).unwrap();

        let report = RestoreEngine::new(&repo)
            .import(backup.as_slice(), "secret1")
            .unwrap();
        assert_eq!(report.notes_imported, 1);
        let notes = repo.list_notes().unwrap();
        assert_eq!(notes[0].title, UNTITLED);
        assert_eq!(notes[0].last_modified, 42);
    }

    #[test]
    fn test_restore_appends_without_dedup() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save_note(&NoteDraft::new("same", "x")).unwrap();
        repo.upload_file(&b"0123456789"[..], "hello.txt", "").unwrap();
        let mut backup = Vec::new();
        BackupEngine::new(&repo).export(&mut backup, "secret1").unwrap();

        let report = RestoreEngine::new(&repo)
            .import(backup.as_slice(), "secret1")
            .unwrap();
        assert_eq!(report.notes_imported, 1);
        assert_eq!(report.files_imported, 1);
        assert_eq!(repo.list_notes().unwrap().len(), 2);
        assert_eq!(repo.file_count().unwrap(), 2);
        assert!(repo.check_integrity().unwrap().is_clean());
    }
}
