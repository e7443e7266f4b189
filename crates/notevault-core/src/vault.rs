//! A vault directory and the components built over it.
//!
//! Layout:
//!
//! ```text
//! <vault>/vault.db.age      encrypted record store
//! <vault>/secure_files/     one envelope file per attachment
//! ```
//!
//! Keys live in the secret store handed to [`Vault::create`] or
//! [`Vault::open`], never in the directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::backup::{BackupEngine, BackupReport};
use crate::blobs::EnvelopeFileStore;
use crate::error::{Result, VaultError};
use crate::gate::AccessGate;
use crate::keys::{KeyMaterialProvider, KeyPurpose, SecretStore};
use crate::repository::{RepairReport, VaultRepository};
use crate::restore::{RestoreEngine, RestoreReport};
use crate::storage::{AgeSqliteStore, RecordStore, StoreMetadata};

pub const RECORD_STORE_FILE: &str = "vault.db.age";
pub const BLOB_DIR: &str = "secure_files";

pub struct Vault {
    dir: PathBuf,
    repo: VaultRepository<AgeSqliteStore>,
    gate: AccessGate,
    startup_repair: RepairReport,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").field("dir", &self.dir).finish()
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

impl Vault {
    /// Whether `dir` already holds a record store.
    pub fn exists(dir: &Path) -> bool {
        dir.join(RECORD_STORE_FILE).exists()
    }

    /// Initialize a new vault in `dir`, generating keys as needed.
    pub fn create(dir: &Path, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        if Self::exists(dir) {
            return Err(VaultError::InvalidInput(format!(
                "A vault already exists at {}",
                dir.display()
            )));
        }
        create_private_dir(dir)?;
        let provider = KeyMaterialProvider::new(Arc::clone(&secrets));
        let key = provider.get_or_create_key(KeyPurpose::RecordStore)?;
        let vault_id = AgeSqliteStore::create(&dir.join(RECORD_STORE_FILE), &key)?;
        info!(%vault_id, dir = %dir.display(), "Created vault");
        Self::open(dir, secrets)
    }

    /// Open an existing vault. Unreferenced blobs left by an interrupted
    /// upload are removed before the vault is handed out.
    pub fn open(dir: &Path, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        if !Self::exists(dir) {
            return Err(VaultError::NotFound(format!("Vault {}", dir.display())));
        }
        let provider = KeyMaterialProvider::new(Arc::clone(&secrets));
        let records = AgeSqliteStore::open(
            &dir.join(RECORD_STORE_FILE),
            &provider.get_or_create_key(KeyPurpose::RecordStore)?,
        )?;
        let blobs = EnvelopeFileStore::open(
            dir.join(BLOB_DIR),
            provider.get_or_create_key(KeyPurpose::Blobs)?,
        )?;
        let repo = VaultRepository::new(records, blobs)?;

        let startup_repair = repo.repair()?;
        if !startup_repair.is_clean() {
            warn!(
                orphans = startup_repair.orphan_blobs_removed.len(),
                missing = startup_repair.rows_missing_blob.len(),
                temp_files = startup_repair.temp_files_removed,
                "Vault needed repair on open"
            );
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            repo,
            gate: AccessGate::new(secrets),
            startup_repair,
        })
    }

    /// Open `dir`, creating the vault first if it does not exist.
    pub fn open_or_create(dir: &Path, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        if Self::exists(dir) {
            Self::open(dir, secrets)
        } else {
            Self::create(dir, secrets)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn repository(&self) -> &VaultRepository<AgeSqliteStore> {
        &self.repo
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// What the repair pass on open found.
    pub fn startup_repair(&self) -> &RepairReport {
        &self.startup_repair
    }

    pub fn metadata(&self) -> Result<StoreMetadata> {
        self.repo.records().metadata()
    }

    pub fn backup(&self, destination: &Path, password: &str) -> Result<BackupReport> {
        BackupEngine::new(&self.repo).run_backup(destination, password)
    }

    pub fn restore(&self, source: &Path, password: &str) -> Result<RestoreReport> {
        RestoreEngine::new(&self.repo).run_restore(source, password)
    }
}
