//! Fire-and-report wrappers around the backup and restore engines.
//!
//! These never return an error: the outcome carries a notification title and
//! message suitable for showing to the user, plus the counts.

use std::path::Path;

use serde::Serialize;
use tracing::error;

use crate::backup::{BackupEngine, BackupReport};
use crate::repository::VaultRepository;
use crate::restore::{RestoreEngine, RestoreReport};
use crate::storage::RecordStore;

pub const BACKUP_TITLE: &str = "notevault backup";
pub const RESTORE_TITLE: &str = "notevault restore";

/// Result of a background backup or restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub success: bool,
    pub title: String,
    pub message: String,
    pub notes: usize,
    pub files: usize,
    /// Attachments skipped on export or rejected on import.
    pub files_failed: usize,
}

impl JobOutcome {
    fn failed(title: &str, message: String) -> Self {
        Self {
            success: false,
            title: title.to_string(),
            message,
            notes: 0,
            files: 0,
            files_failed: 0,
        }
    }
}

fn partial_suffix(failed: usize) -> String {
    match failed {
        0 => String::new(),
        1 => " (1 attachment could not be processed)".to_string(),
        n => format!(" ({} attachments could not be processed)", n),
    }
}

impl From<&BackupReport> for JobOutcome {
    fn from(report: &BackupReport) -> Self {
        Self {
            success: true,
            title: BACKUP_TITLE.to_string(),
            message: format!(
                "Backup completed successfully{}",
                partial_suffix(report.files_skipped)
            ),
            notes: report.notes_exported,
            files: report.files_exported,
            files_failed: report.files_skipped,
        }
    }
}

impl From<&RestoreReport> for JobOutcome {
    fn from(report: &RestoreReport) -> Self {
        Self {
            success: true,
            title: RESTORE_TITLE.to_string(),
            message: format!(
                "Backup imported successfully{}",
                partial_suffix(report.files_failed)
            ),
            notes: report.notes_imported,
            files: report.files_imported,
            files_failed: report.files_failed,
        }
    }
}

pub fn run_backup<S: RecordStore>(
    repo: &VaultRepository<S>,
    destination: &Path,
    password: &str,
) -> JobOutcome {
    match BackupEngine::new(repo).run_backup(destination, password) {
        Ok(report) => JobOutcome::from(&report),
        Err(e) => {
            error!(error = %e, destination = %destination.display(), "Backup failed");
            JobOutcome::failed(BACKUP_TITLE, format!("Error during backup: {}", e))
        }
    }
}

pub fn run_restore<S: RecordStore>(
    repo: &VaultRepository<S>,
    source: &Path,
    password: &str,
) -> JobOutcome {
    match RestoreEngine::new(repo).run_restore(source, password) {
        Ok(report) => JobOutcome::from(&report),
        Err(e) => {
            error!(error = %e, source = %source.display(), "Restore failed");
            JobOutcome::failed(RESTORE_TITLE, format!("Error during restore: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobs::EnvelopeFileStore;
    use crate::crypto::KeyMaterial;
    use crate::storage::{AgeSqliteStore, NoteDraft};
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
    fn test_backup_then_restore_outcomes() {
        let dir = tempdir().unwrap();
        let source = repo(&dir.path().join("a"));
        source.save_note(&NoteDraft::new("n", "c")).unwrap();
        let dest = dir.path().join("out.nvbak");

        let backup = run_backup(&source, &dest, "secret1");
        assert!(backup.success);
        assert_eq!(backup.title, BACKUP_TITLE);
        assert_eq!(backup.message, "Backup completed successfully");
        assert_eq!(backup.notes, 1);

        let target = repo(&dir.path().join("b"));
        let restore = run_restore(&target, &dest, "secret1");
        assert!(restore.success);
        assert_eq!(restore.message, "Backup imported successfully");
        assert_eq!(restore.notes, 1);
    }

    #[test]
    fn test_failures_become_outcomes() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let outcome = run_backup(&repo, &dir.path().join("x"), "123");
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error during backup"));

        let outcome = run_restore(&repo, &dir.path().join("missing"), "secret1");
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error during restore: "));
    }

    #[test]
    fn test_partial_suffix_wording() {
        assert_eq!(partial_suffix(0), "");
        assert!(partial_suffix(1).contains("1 attachment "));
        assert!(partial_suffix(3).contains("3 attachments"));
    }

    #[test]
    fn test_partial_report_wording() {
        let report = RestoreReport {
            notes_imported: 4,
            files_imported: 3,
            files_failed: 2,
        };
        let outcome = JobOutcome::from(&report);
        assert!(outcome.success);
        assert_eq!(
            outcome.message,
            "Backup imported successfully (2 attachments could not be processed)"
        );
        assert_eq!((outcome.notes, outcome.files, outcome.files_failed), (4, 3, 2));
    }
}
